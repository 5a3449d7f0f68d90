pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod stochastic;

pub use adx::AdxIndicator;
pub use atr::AtrIndicator;
pub use bollinger::BollingerIndicator;
pub use macd::MacdIndicator;
pub use moving_average::{ema, sma};
pub use rsi::RsiIndicator;
pub use stochastic::StochasticIndicator;
