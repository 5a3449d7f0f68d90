//! Performance accounting shared by the simulator and the live trader.

use serde::{Deserialize, Serialize};

use common::{Action, PortfolioSnapshot, Side};

/// Flat result payload handed to persistence and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub sharpe_ratio: f64,
    pub final_capital: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub order_count: usize,
}

impl PerformanceSummary {
    /// Summarize a run. `final_capital` is the last snapshot, or `initial`
    /// when nothing was processed.
    pub fn compute(
        snapshots: &[PortfolioSnapshot],
        actions: &[Action],
        initial: f64,
        periods_per_year: f64,
    ) -> Self {
        let values: Vec<f64> = snapshots.iter().map(|s| s.value).collect();
        Self {
            sharpe_ratio: sharpe_ratio(&values, periods_per_year),
            final_capital: values.last().copied().unwrap_or(initial),
            max_drawdown_pct: max_drawdown_pct(&values),
            win_rate_pct: win_rate_pct(actions),
            order_count: actions.iter().filter(|a| a.side != Side::Hold).count(),
        }
    }
}

/// Annualized Sharpe ratio of per-period simple returns, zero risk-free rate.
///
/// Returns 0 with fewer than two returns or zero dispersion. Periods whose
/// previous value is 0 are skipped.
pub fn sharpe_ratio(values: &[f64], periods_per_year: f64) -> f64 {
    let returns: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 || !std_dev.is_finite() {
        return 0.0;
    }
    mean / std_dev * periods_per_year.sqrt()
}

/// Largest peak-to-trough decline, in percent of the peak.
pub fn max_drawdown_pct(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &v in values {
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            worst = worst.max((peak - v) / peak * 100.0);
        }
    }
    worst
}

/// Share of completed buy→sell round trips that sold above the buy price.
pub fn win_rate_pct(actions: &[Action]) -> f64 {
    let mut open_price: Option<f64> = None;
    let mut wins = 0usize;
    let mut total = 0usize;

    for action in actions {
        match action.side {
            Side::Buy => open_price = Some(action.price),
            Side::Sell => {
                if let Some(buy) = open_price.take() {
                    total += 1;
                    if action.price > buy {
                        wins += 1;
                    }
                }
            }
            Side::Hold => {}
        }
    }

    if total == 0 {
        0.0
    } else {
        wins as f64 / total as f64 * 100.0
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use common::Trigger;

    fn action(side: Side, price: f64) -> Action {
        Action {
            timestamp: 0,
            side,
            trigger: Trigger::Signal,
            price,
            quantity: 1.0,
            profit: None,
            portfolio_value: 0.0,
        }
    }

    #[test]
    fn sharpe_needs_two_returns() {
        assert_eq!(sharpe_ratio(&[], 252.0), 0.0);
        assert_eq!(sharpe_ratio(&[100.0, 101.0], 252.0), 0.0);
    }

    #[test]
    fn flat_values_have_no_dispersion() {
        assert_eq!(sharpe_ratio(&[100.0, 100.0, 100.0, 100.0], 252.0), 0.0);
    }

    #[test]
    fn sharpe_matches_hand_computation() {
        // +10% then -10%: mean 0
        let values = [100.0, 110.0, 99.0];
        let mean = (0.1 + -0.1) / 2.0;
        let sd = 0.1f64;
        let expected = mean / sd * 252f64.sqrt();
        assert!((sharpe_ratio(&values, 252.0) - expected).abs() < 1e-9);

        let values = [100.0, 110.0, 121.0, 127.05];
        let s = sharpe_ratio(&values, 1.0);
        assert!(s > 0.0);
        assert!((sharpe_ratio(&values, 4.0) - 2.0 * s).abs() < 1e-9);
    }

    #[test]
    fn zero_previous_value_is_skipped() {
        let with_zero = sharpe_ratio(&[0.0, 100.0, 110.0, 99.0], 252.0);
        let without = sharpe_ratio(&[100.0, 110.0, 99.0], 252.0);
        assert!((with_zero - without).abs() < 1e-12);
    }

    #[test]
    fn drawdown_from_running_peak() {
        assert_eq!(max_drawdown_pct(&[]), 0.0);
        let dd = max_drawdown_pct(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        assert!((dd - 25.0).abs() < 1e-9);
    }

    #[test]
    fn win_rate_pairs_buys_with_sells() {
        let actions = vec![
            action(Side::Buy, 10.0),
            action(Side::Sell, 12.0),
            action(Side::Hold, 0.0),
            action(Side::Buy, 12.0),
            action(Side::Sell, 11.0),
        ];
        assert_eq!(win_rate_pct(&actions), 50.0);
        assert_eq!(win_rate_pct(&actions[..1]), 0.0);
        assert_eq!(win_rate_pct(&[]), 0.0);
    }

    #[test]
    fn summary_of_empty_run_keeps_initial_capital() {
        let summary = PerformanceSummary::compute(&[], &[], 10_000.0, 252.0);
        assert_eq!(summary.final_capital, 10_000.0);
        assert_eq!(summary.order_count, 0);
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["final_capital"], 10_000.0);
    }
}
