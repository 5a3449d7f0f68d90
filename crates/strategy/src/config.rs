use std::path::Path;

use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Flat strategy configuration, exchanged with persistence collaborators as a
/// JSON object keyed by these field names.
///
/// Example `config/params.json`:
/// ```json
/// {
///   "ema_short_period": 12,
///   "ema_long_period": 26,
///   "buy_threshold": 0.5,
///   "sell_threshold": -0.5,
///   "rsi_weight": 2.0
/// }
/// ```
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParameters {
    // Periods
    pub ma_short_period: usize,
    pub ma_long_period: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub ema_short_period: usize,
    pub ema_long_period: usize,
    pub macd_short_period: usize,
    pub macd_long_period: usize,
    pub macd_signal_period: usize,
    pub bollinger_period: usize,
    pub stochastic_k_period: usize,
    pub stochastic_d_period: usize,

    // Thresholds
    pub rsi_buy_threshold: f64,
    pub rsi_sell_threshold: f64,
    /// ATR as a fraction of close above which a bar counts as volatile.
    pub atr_volatility_threshold: f64,
    pub buy_threshold: f64,
    /// Negative.
    pub sell_threshold: f64,
    pub bollinger_std_dev: f64,

    // Weights
    pub ema_weight: f64,
    pub trend_weight: f64,
    pub rsi_weight: f64,
    pub macd_weight: f64,
    pub bollinger_weight: f64,
    pub stochastic_weight: f64,
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            ma_short_period: 10,
            ma_long_period: 30,
            rsi_period: 14,
            atr_period: 14,
            ema_short_period: 12,
            ema_long_period: 26,
            macd_short_period: 12,
            macd_long_period: 26,
            macd_signal_period: 9,
            bollinger_period: 20,
            stochastic_k_period: 14,
            stochastic_d_period: 3,

            rsi_buy_threshold: 30.0,
            rsi_sell_threshold: 70.0,
            atr_volatility_threshold: 0.0,
            buy_threshold: 0.5,
            sell_threshold: -0.5,
            bollinger_std_dev: 2.0,

            ema_weight: 1.0,
            trend_weight: 1.0,
            rsi_weight: 1.0,
            macd_weight: 1.0,
            bollinger_weight: 1.0,
            stochastic_weight: 1.0,
        }
    }
}

impl StrategyParameters {
    fn periods(&self) -> [(&'static str, usize); 12] {
        [
            ("ma_short_period", self.ma_short_period),
            ("ma_long_period", self.ma_long_period),
            ("rsi_period", self.rsi_period),
            ("atr_period", self.atr_period),
            ("ema_short_period", self.ema_short_period),
            ("ema_long_period", self.ema_long_period),
            ("macd_short_period", self.macd_short_period),
            ("macd_long_period", self.macd_long_period),
            ("macd_signal_period", self.macd_signal_period),
            ("bollinger_period", self.bollinger_period),
            ("stochastic_k_period", self.stochastic_k_period),
            ("stochastic_d_period", self.stochastic_d_period),
        ]
    }

    /// Weights in sub-signal order: EMA, trend, RSI, MACD, Bollinger, Stochastic.
    pub fn weights(&self) -> [f64; 6] {
        [
            self.ema_weight,
            self.trend_weight,
            self.rsi_weight,
            self.macd_weight,
            self.bollinger_weight,
            self.stochastic_weight,
        ]
    }

    /// Minimum number of bars before the indicator pipeline produces output.
    pub fn required_window(&self) -> usize {
        self.periods().iter().map(|(_, p)| *p).max().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((name, _)) = self.periods().iter().find(|(_, p)| *p == 0) {
            return Err(Error::InvalidParameters(format!("{name} must be > 0")));
        }
        if self
            .weights()
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(Error::InvalidParameters(
                "weights must be finite and >= 0".to_string(),
            ));
        }
        if !(self.buy_threshold.is_finite() && self.sell_threshold.is_finite()) {
            return Err(Error::InvalidParameters(
                "buy/sell thresholds must be finite".to_string(),
            ));
        }
        if self.sell_threshold >= self.buy_threshold {
            return Err(Error::InvalidParameters(format!(
                "sell_threshold ({}) must be below buy_threshold ({})",
                self.sell_threshold, self.buy_threshold
            )));
        }
        if !self.bollinger_std_dev.is_finite() || self.bollinger_std_dev < 0.0 {
            return Err(Error::InvalidParameters(
                "bollinger_std_dev must be finite and >= 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from a `.json` or `.toml` file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let params: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        params.validate()?;
        Ok(params)
    }
}
