use serde::Serialize;

use common::{Action, FeatureBar, PortfolioSnapshot, PositionState, PriceBar, Side};
use risk::PerformanceSummary;

/// Mutable state of one live or paper trading session.
///
/// Owned by the trader task; everything else reads a [`SessionView`].
#[derive(Debug)]
pub struct TraderSession {
    id: String,
    symbol: String,
    initial_capital: f64,
    bars: Vec<PriceBar>,
    features: Vec<FeatureBar>,
    actions: Vec<Action>,
    snapshots: Vec<PortfolioSnapshot>,
    pub(crate) cash: f64,
    pub(crate) position: PositionState,
}

impl TraderSession {
    pub fn new(symbol: impl Into<String>, initial_capital: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            initial_capital,
            bars: Vec::new(),
            features: Vec::new(),
            actions: Vec::new(),
            snapshots: Vec::new(),
            cash: initial_capital,
            position: PositionState::Flat,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn features(&self) -> &[FeatureBar] {
        &self.features
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn snapshots(&self) -> &[PortfolioSnapshot] {
        &self.snapshots
    }

    pub fn position(&self) -> &PositionState {
        &self.position
    }

    /// Append a bar, or replace the last one when it has the same timestamp
    /// (an update of a still-forming candle). Returns true on replacement.
    pub fn push_bar(&mut self, bar: PriceBar) -> bool {
        match self.bars.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => {
                *last = bar;
                true
            }
            _ => {
                self.bars.push(bar);
                false
            }
        }
    }

    pub(crate) fn set_features(&mut self, features: Vec<FeatureBar>) {
        self.features = features;
    }

    pub(crate) fn record_action(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Mark the portfolio to `close` and append the snapshot.
    pub(crate) fn record_snapshot(&mut self, timestamp: i64, close: f64) -> PortfolioSnapshot {
        let snapshot = PortfolioSnapshot {
            timestamp,
            value: self.cash + self.position.quantity() * close,
        };
        self.snapshots.push(snapshot);
        snapshot
    }

    /// The most recent buy in the ledger.
    pub fn last_buy(&self) -> Option<&Action> {
        self.actions.iter().rev().find(|a| a.side == Side::Buy)
    }

    pub fn performance(&self, periods_per_year: f64) -> PerformanceSummary {
        PerformanceSummary::compute(
            &self.snapshots,
            &self.actions,
            self.initial_capital,
            periods_per_year,
        )
    }

    /// Owned, read-only copy for reporting.
    pub fn view(&self, periods_per_year: f64) -> SessionView {
        SessionView {
            id: self.id.clone(),
            symbol: self.symbol.clone(),
            initial_capital: self.initial_capital,
            bars_held: self.bars.len(),
            position: self.position,
            latest_features: self.features.last().cloned(),
            actions: self.actions.clone(),
            snapshots: self.snapshots.clone(),
            performance: self.performance(periods_per_year),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    pub symbol: String,
    pub initial_capital: f64,
    pub bars_held: usize,
    pub position: PositionState,
    pub latest_features: Option<FeatureBar>,
    pub actions: Vec<Action>,
    pub snapshots: Vec<PortfolioSnapshot>,
    pub performance: PerformanceSummary,
}
