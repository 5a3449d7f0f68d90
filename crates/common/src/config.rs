use crate::{Error, Result, Timeframe, TradingMode};

/// Annualization used for Sharpe ratios unless configured otherwise.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// All configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange
    pub trading_mode: TradingMode,
    pub binance_api_key: Option<String>,
    pub binance_secret: Option<String>,

    // Market
    pub symbol: String,
    pub quote_coin: String,
    pub timeframe: Timeframe,
    /// WebSocket endpoint emitting one JSON `PriceBar` per message.
    pub bar_stream_url: String,

    // Trading
    pub initial_capital: f64,
    pub paper_slippage_bps: f64,
    pub order_sync_interval_secs: u64,
    pub periods_per_year: f64,

    // Strategy parameters file (.json or .toml)
    pub strategy_params_path: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let trading_mode: TradingMode = lookup("TRADING_MODE")
            .unwrap_or_else(|| "paper".to_string())
            .parse()?;

        let binance_api_key = lookup("BINANCE_API_KEY");
        let binance_secret = lookup("BINANCE_SECRET");
        if trading_mode == TradingMode::Live
            && (binance_api_key.is_none() || binance_secret.is_none())
        {
            return Err(Error::Config(
                "BINANCE_API_KEY and BINANCE_SECRET are required in live mode".to_string(),
            ));
        }

        let timeframe: Timeframe = lookup("TIMEFRAME")
            .unwrap_or_else(|| "1m".to_string())
            .parse()?;

        let periods_per_year = match lookup("SHARPE_PERIODS_PER_YEAR") {
            None => DEFAULT_PERIODS_PER_YEAR,
            Some(v) if v.trim().eq_ignore_ascii_case("auto") => timeframe.periods_per_year(),
            Some(v) => parse_number("SHARPE_PERIODS_PER_YEAR", &v)?,
        };

        Ok(Config {
            trading_mode,
            binance_api_key,
            binance_secret,
            symbol: lookup("SYMBOL").unwrap_or_else(|| "BTCUSDT".to_string()),
            quote_coin: lookup("QUOTE_COIN").unwrap_or_else(|| "USDT".to_string()),
            timeframe,
            bar_stream_url: lookup("BAR_STREAM_URL")
                .unwrap_or_else(|| "ws://127.0.0.1:9000/bars".to_string()),
            initial_capital: optional_number(&lookup, "INITIAL_CAPITAL", 10_000.0)?,
            paper_slippage_bps: optional_number(&lookup, "PAPER_SLIPPAGE_BPS", 10.0)?,
            order_sync_interval_secs: optional_number(&lookup, "ORDER_SYNC_INTERVAL_SECS", 5.0)?
                as u64,
            periods_per_year,
            strategy_params_path: lookup("STRATEGY_PARAMS_PATH"),
        })
    }
}

fn optional_number<F>(lookup: &F, key: &str, default: f64) -> Result<f64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => parse_number(key, &v),
        None => Ok(default),
    }
}

fn parse_number(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{key} must be a number, got '{value}'")))
}
