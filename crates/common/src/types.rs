use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV observation for a fixed time interval.
///
/// `timestamp` is epoch milliseconds and strictly increasing within a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Bar with open = high = low = close, mostly useful in tests.
    pub fn flat(timestamp: i64, price: f64) -> Self {
        Self::new(timestamp, price, price, price, price, 0.0)
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// A price bar enriched with indicator values and the discrete trade signal.
///
/// Indicator fields are NaN while their warm-up window is not yet filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBar {
    #[serde(flatten)]
    pub bar: PriceBar,
    pub atr: f64,
    pub rsi: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub ema_short: f64,
    pub ema_long: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub bollinger_upper: f64,
    pub bollinger_lower: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub adx: f64,
    pub trending: bool,
    pub volatile: bool,
    /// -1 sell/avoid, 0 hold, 1 buy.
    pub signal: i8,
    /// Change in signal relative to the previous bar.
    pub position: i8,
}

impl FeatureBar {
    pub fn from_bar(bar: PriceBar) -> Self {
        Self {
            bar,
            atr: f64::NAN,
            rsi: f64::NAN,
            sma_short: f64::NAN,
            sma_long: f64::NAN,
            ema_short: f64::NAN,
            ema_long: f64::NAN,
            macd: f64::NAN,
            macd_signal: f64::NAN,
            bollinger_upper: f64::NAN,
            bollinger_lower: f64::NAN,
            stoch_k: f64::NAN,
            stoch_d: f64::NAN,
            adx: f64::NAN,
            trending: false,
            volatile: false,
            signal: 0,
            position: 0,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.bar.timestamp
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }
}

/// Side of a recorded action or an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
            Side::Hold => write!(f, "HOLD"),
        }
    }
}

/// Why a trade happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfSeries,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Signal => write!(f, "signal"),
            Trigger::StopLoss => write!(f, "stop_loss"),
            Trigger::TakeProfit => write!(f, "take_profit"),
            Trigger::EndOfSeries => write!(f, "end_of_series"),
        }
    }
}

/// One entry of the action ledger. Never mutated after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub timestamp: i64,
    pub side: Side,
    pub trigger: Trigger,
    /// Fill price after costs.
    pub price: f64,
    /// Base asset quantity.
    pub quantity: f64,
    /// Realized profit, only set on closing trades.
    pub profit: Option<f64>,
    /// Portfolio value right after the action.
    pub portfolio_value: f64,
}

/// Mark-to-market portfolio value at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: i64,
    pub value: f64,
}

/// An open long position. Stop-loss and take-profit are fixed at entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub quantity: f64,
    pub opened_at: i64,
}

/// Single-position state: either flat or long, never both.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PositionState {
    #[default]
    Flat,
    Long(OpenPosition),
}

impl PositionState {
    pub fn is_long(&self) -> bool {
        matches!(self, PositionState::Long(_))
    }

    pub fn quantity(&self) -> f64 {
        match self {
            PositionState::Flat => 0.0,
            PositionState::Long(p) => p.quantity,
        }
    }
}

/// Whether the bot is running against the real exchange or simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

impl std::str::FromStr for TradingMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paper" => Ok(TradingMode::Paper),
            "live" => Ok(TradingMode::Live),
            other => Err(crate::Error::Config(format!(
                "trading mode must be 'paper' or 'live', got '{other}'"
            ))),
        }
    }
}

/// Candle interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// Number of bars in a year for a market that trades around the clock.
    pub fn periods_per_year(&self) -> f64 {
        365.0 * 1440.0 / self.minutes() as f64
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(crate::Error::Config(format!("unsupported timeframe '{other}'"))),
        }
    }
}

/// Fill status of an order as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    /// Filled, canceled and rejected orders never change again.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Canceled => write!(f, "CANCELED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// A market order to be submitted to the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    /// Only `Buy` and `Sell` are ever submitted.
    pub side: Side,
    /// Base asset quantity.
    pub quantity: f64,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: Side, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            take_profit: None,
            stop_loss: None,
        }
    }

    pub fn with_bracket(mut self, stop_loss: f64, take_profit: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self.take_profit = Some(take_profit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_bar_json_shape() {
        let bar: PriceBar = serde_json::from_str(
            r#"{"timestamp":1700000000000,"open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":10.0}"#,
        )
        .unwrap();
        assert_eq!(bar.timestamp, 1_700_000_000_000);
        assert_eq!(bar.close, 1.5);
        assert!(bar.datetime().is_some());
    }

    #[test]
    fn timeframe_parses_and_annualizes() {
        let tf: Timeframe = "1h".parse().unwrap();
        assert_eq!(tf, Timeframe::H1);
        assert_eq!(tf.periods_per_year(), 365.0 * 24.0);
        assert_eq!(Timeframe::D1.periods_per_year(), 365.0);
        assert!("2w".parse::<Timeframe>().is_err());
    }

    #[test]
    fn trading_mode_is_case_insensitive() {
        assert_eq!("PAPER".parse::<TradingMode>().unwrap(), TradingMode::Paper);
        assert!("demo".parse::<TradingMode>().is_err());
    }

    #[test]
    fn final_order_statuses() {
        assert!(OrderStatus::Filled.is_final());
        assert!(OrderStatus::Rejected.is_final());
        assert!(!OrderStatus::New.is_final());
        assert!(!OrderStatus::PartiallyFilled.is_final());
    }
}
