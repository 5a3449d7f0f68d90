pub mod simulator;
pub mod sweep;

pub use simulator::{simulate, BacktestConfig, BacktestResult};
pub use sweep::{best_trial, evaluate_trials, fitness, Trial};
