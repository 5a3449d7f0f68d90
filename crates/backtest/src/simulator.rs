use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{
    Action, Error, PortfolioSnapshot, PositionState, PriceBar, Result, Side, Trigger,
    DEFAULT_PERIODS_PER_YEAR,
};
use risk::{exit_trigger, CostModel, PerformanceSummary, RiskConfig};
use strategy::{apply_indicators, generate_signals, is_warm, StrategyParameters};

/// Simulator settings that are not strategy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub costs: CostModel,
    pub risk: RiskConfig,
    /// Annualization factor for the Sharpe ratio.
    pub periods_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            costs: CostModel::default(),
            risk: RiskConfig::default(),
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

/// Outcome of one simulator run. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    actions: Vec<Action>,
    snapshots: Vec<PortfolioSnapshot>,
    summary: PerformanceSummary,
}

impl BacktestResult {
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn snapshots(&self) -> &[PortfolioSnapshot] {
        &self.snapshots
    }

    pub fn summary(&self) -> &PerformanceSummary {
        &self.summary
    }

    pub fn final_capital(&self) -> f64 {
        self.summary.final_capital
    }

    pub fn sharpe_ratio(&self) -> f64 {
        self.summary.sharpe_ratio
    }

    pub fn max_drawdown_pct(&self) -> f64 {
        self.summary.max_drawdown_pct
    }

    pub fn win_rate_pct(&self) -> f64 {
        self.summary.win_rate_pct
    }
}

/// Replay the strategy over `bars` once.
///
/// The decision on bar `i` executes at the open of bar `i + 1`. A long still
/// open on the last bar is liquidated at its close. Each bar gets exactly one
/// snapshot, taken before that bar's decision. A warm bar with zero ATR fails
/// the whole run.
pub fn simulate(
    bars: &[PriceBar],
    params: &StrategyParameters,
    config: &BacktestConfig,
) -> Result<BacktestResult> {
    params.validate()?;

    let mut features = apply_indicators(bars, params);
    generate_signals(&mut features, params);

    let costs = &config.costs;
    let n = bars.len();
    let mut cash = config.initial_capital;
    let mut position = PositionState::Flat;
    let mut entry_outlay = 0.0;
    let mut actions: Vec<Action> = Vec::new();
    let mut snapshots = Vec::with_capacity(n);

    for (i, bar) in bars.iter().enumerate() {
        let is_last = i + 1 == n;

        if is_last {
            if let PositionState::Long(open) = position {
                let fill = costs.exit(open.quantity, bar.close);
                cash += fill.proceeds;
                position = PositionState::Flat;
                actions.push(Action {
                    timestamp: bar.timestamp,
                    side: Side::Sell,
                    trigger: Trigger::EndOfSeries,
                    price: fill.price,
                    quantity: open.quantity,
                    profit: Some(fill.proceeds - entry_outlay),
                    portfolio_value: cash,
                });
            }
        }

        snapshots.push(PortfolioSnapshot {
            timestamp: bar.timestamp,
            value: cash + position.quantity() * bar.close,
        });

        if i == 0 || is_last {
            continue;
        }
        let Some(f) = features.get(i).filter(|f| is_warm(f)) else {
            continue;
        };
        if f.atr == 0.0 {
            return Err(Error::ZeroAtr {
                index: i,
                timestamp: bar.timestamp,
            });
        }

        let next = &bars[i + 1];
        match position {
            PositionState::Long(open) => {
                let Some(trigger) = exit_trigger(&open, f.close(), f.signal) else {
                    continue;
                };
                let fill = costs.exit(open.quantity, next.open);
                let profit = fill.proceeds - entry_outlay;
                cash += fill.proceeds;
                position = PositionState::Flat;
                debug!(index = i, %trigger, price = fill.price, profit, "Simulated sell");
                actions.push(Action {
                    timestamp: next.timestamp,
                    side: Side::Sell,
                    trigger,
                    price: fill.price,
                    quantity: open.quantity,
                    profit: Some(profit),
                    portfolio_value: cash,
                });
            }
            PositionState::Flat => {
                if f.signal != 1 || cash <= 0.0 {
                    continue;
                }
                let fill = costs.enter(cash, next.open);
                entry_outlay = cash;
                cash = 0.0;
                let open = config
                    .risk
                    .open(fill.price, fill.quantity, f.atr, next.timestamp);
                position = PositionState::Long(open);
                debug!(
                    index = i,
                    price = fill.price,
                    stop_loss = open.stop_loss,
                    take_profit = open.take_profit,
                    "Simulated buy"
                );
                actions.push(Action {
                    timestamp: next.timestamp,
                    side: Side::Buy,
                    trigger: Trigger::Signal,
                    price: fill.price,
                    quantity: fill.quantity,
                    profit: None,
                    portfolio_value: fill.quantity * fill.price,
                });
            }
        }
    }

    let summary = PerformanceSummary::compute(
        &snapshots,
        &actions,
        config.initial_capital,
        config.periods_per_year,
    );
    Ok(BacktestResult {
        actions,
        snapshots,
        summary,
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
