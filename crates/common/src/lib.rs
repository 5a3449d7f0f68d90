pub mod config;
pub mod error;
pub mod exchange;
pub mod types;

pub use config::{Config, DEFAULT_PERIODS_PER_YEAR};
pub use error::{Error, Result};
pub use exchange::ExchangeClient;
pub use types::*;
