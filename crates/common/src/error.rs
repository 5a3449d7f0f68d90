use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid strategy parameters: {0}")]
    InvalidParameters(String),

    /// ATR is required for stop-loss/take-profit sizing.
    #[error("ATR is zero at bar {index} (timestamp {timestamp}); cannot size risk")]
    ZeroAtr { index: usize, timestamp: i64 },

    /// Local position state and the order book disagree. Fatal for the session.
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("Price stream failed: {0}")]
    Stream(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
