pub mod config;
pub mod indicators;
pub mod pipeline;
pub mod signal;

pub use config::StrategyParameters;
pub use pipeline::{apply_indicators, is_warm};
pub use signal::{generate_signals, normalize_weights};

use common::{FeatureBar, PriceBar, Result};

/// All strategy implementations must satisfy this trait.
pub trait Strategy: Send + Sync {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    /// Minimum number of bars before `evaluate` produces anything.
    fn required_window(&self) -> usize;

    /// Derive features and signals for the whole series.
    ///
    /// Returns an empty vector while the history is shorter than
    /// `required_window()`.
    fn evaluate(&self, bars: &[PriceBar]) -> Vec<FeatureBar>;
}

/// The weighted multi-indicator strategy.
#[derive(Debug, Clone)]
pub struct WeightedStrategy {
    name: String,
    params: StrategyParameters,
}

impl WeightedStrategy {
    pub fn new(name: impl Into<String>, params: StrategyParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            name: name.into(),
            params,
        })
    }

    pub fn params(&self) -> &StrategyParameters {
        &self.params
    }
}

impl Strategy for WeightedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_window(&self) -> usize {
        self.params.required_window()
    }

    fn evaluate(&self, bars: &[PriceBar]) -> Vec<FeatureBar> {
        let mut features = apply_indicators(bars, &self.params);
        generate_signals(&mut features, &self.params);
        features
    }
}
