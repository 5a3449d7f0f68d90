//! Fitness contract and parallel trial evaluation for an external optimizer.

use rayon::prelude::*;
use tracing::{debug, info};

use common::{PriceBar, Result};
use strategy::StrategyParameters;

use crate::simulator::{simulate, BacktestConfig, BacktestResult};

/// One evaluated parameter set.
#[derive(Debug)]
pub struct Trial {
    pub params: StrategyParameters,
    pub result: Result<BacktestResult>,
}

impl Trial {
    pub fn fitness(&self) -> f64 {
        fitness(&self.result)
    }
}

/// Score to maximize: the Sharpe ratio, or −∞ for a failed run.
pub fn fitness(result: &Result<BacktestResult>) -> f64 {
    match result {
        Ok(r) if r.sharpe_ratio().is_finite() => r.sharpe_ratio(),
        _ => f64::NEG_INFINITY,
    }
}

/// Run one simulation per parameter set, in parallel. Output order matches
/// `trials`.
pub fn evaluate_trials(
    bars: &[PriceBar],
    trials: &[StrategyParameters],
    config: &BacktestConfig,
) -> Vec<Trial> {
    info!(trials = trials.len(), bars = bars.len(), "Evaluating trials");
    trials
        .par_iter()
        .map(|params| {
            let result = simulate(bars, params, config);
            if let Err(e) = &result {
                debug!(error = %e, "Trial failed");
            }
            Trial {
                params: params.clone(),
                result,
            }
        })
        .collect()
}

/// The highest-fitness trial. Failed trials only win when nothing succeeded.
pub fn best_trial(trials: &[Trial]) -> Option<&Trial> {
    trials.iter().max_by(|a, b| {
        a.fitness()
            .partial_cmp(&b.fitness())
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
