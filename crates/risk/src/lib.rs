pub mod costs;
pub mod performance;

pub use costs::{exit_trigger, CostModel, EntryFill, ExitFill, RiskConfig};
pub use performance::{max_drawdown_pct, sharpe_ratio, win_rate_pct, PerformanceSummary};
