use std::sync::Arc;

use futures_util::{pin_mut, Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};

use common::{
    Action, Error, FeatureBar, OrderRequest, OrderStatus, PositionState, PriceBar, Result, Side,
    Trigger,
};
use risk::{exit_trigger, PerformanceSummary, RiskConfig};
use strategy::{is_warm, Strategy};

use crate::metrics::{MetricsEvent, MetricsSink};
use crate::orders::{OrderManager, OrderRecord};
use crate::session::{SessionView, TraderSession};

/// Most quote currency a single live entry may spend.
pub const LIVE_QUOTE_CAP: f64 = 100.0;

/// Share of the spendable quote held back for slippage and fees.
pub const COST_HEADROOM: f64 = 0.01;

/// An order placed on an earlier bar that the venue had not settled yet.
#[derive(Debug, Clone)]
struct PendingOrder {
    order_id: String,
    trigger: Trigger,
    atr: f64,
}

/// What to do on the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold,
    Buy,
    Sell(Trigger),
}

/// Decide the action for one bar.
///
/// `ground_long` is the order book's view (last filled order was a buy).
/// A buy needs a buy signal and no position on the book. A sell needs an exit
/// trigger (stop-loss, take-profit, then a sell signal) and a position on
/// either side. If both would be allowed the two views have diverged, which is
/// a fatal [`Error::ConsistencyViolation`].
pub fn decide(
    signal: i8,
    close: f64,
    local: &PositionState,
    ground_long: bool,
) -> Result<Decision> {
    let exit = match local {
        PositionState::Long(open) => exit_trigger(open, close, signal),
        PositionState::Flat if signal == -1 => Some(Trigger::Signal),
        PositionState::Flat => None,
    };
    let buy_permitted = signal == 1 && !ground_long;
    let sell_permitted = exit.is_some() && (ground_long || local.is_long());

    match (buy_permitted, sell_permitted, exit) {
        (true, true, _) => Err(Error::ConsistencyViolation(format!(
            "buy and sell both permitted (signal {signal}, local long {}, order book long {ground_long}, exit {exit:?})",
            local.is_long()
        ))),
        (true, false, _) => Ok(Decision::Buy),
        (false, true, Some(trigger)) => Ok(Decision::Sell(trigger)),
        _ => Ok(Decision::Hold),
    }
}

#[derive(Debug, Clone)]
pub struct TraderConfig {
    pub symbol: String,
    pub quote_coin: String,
    pub initial_capital: f64,
    pub risk: RiskConfig,
    pub periods_per_year: f64,
}

/// Final report of a session whose bar stream ended normally.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub symbol: String,
    pub bars_processed: usize,
    pub position: PositionState,
    pub performance: PerformanceSummary,
}

/// Incremental trader: one bar in, at most one action out.
pub struct Trader {
    session: TraderSession,
    strategy: Arc<dyn Strategy>,
    orders: OrderManager,
    metrics: Arc<dyn MetricsSink>,
    quote_coin: String,
    risk: RiskConfig,
    periods_per_year: f64,
    pending: Option<PendingOrder>,
}

impl Trader {
    pub fn new(
        config: TraderConfig,
        strategy: Arc<dyn Strategy>,
        orders: OrderManager,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            session: TraderSession::new(config.symbol, config.initial_capital),
            strategy,
            orders,
            metrics,
            quote_coin: config.quote_coin,
            risk: config.risk,
            periods_per_year: config.periods_per_year,
            pending: None,
        }
    }

    pub fn session(&self) -> &TraderSession {
        &self.session
    }

    pub fn view(&self) -> SessionView {
        self.session.view(self.periods_per_year)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session.id().to_string(),
            symbol: self.session.symbol().to_string(),
            bars_processed: self.session.snapshots().len(),
            position: *self.session.position(),
            performance: self.session.performance(self.periods_per_year),
        }
    }

    /// Consume bars until the stream ends. A stream error or a consistency
    /// violation ends the session with that error.
    pub async fn run<S>(mut self, bars: S) -> Result<SessionSummary>
    where
        S: Stream<Item = Result<PriceBar>>,
    {
        let span = info_span!(
            "session",
            id = %self.session.id(),
            symbol = %self.session.symbol()
        );
        async move {
            pin_mut!(bars);
            info!(strategy = %self.strategy.name(), "Session started");

            while let Some(item) = bars.next().await {
                let bar = match item {
                    Ok(bar) => bar,
                    Err(e) => {
                        error!(error = %e, "Bar stream failed; ending session");
                        return Err(e);
                    }
                };
                self.on_bar(bar).await?;
            }

            let summary = self.summary();
            info!(
                bars = summary.bars_processed,
                orders = summary.performance.order_count,
                final_value = summary.performance.final_capital,
                sharpe = summary.performance.sharpe_ratio,
                "Bar stream ended; session closed"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Process one bar: update history, recompute features, act, snapshot.
    pub async fn on_bar(&mut self, bar: PriceBar) -> Result<Option<Action>> {
        if self.session.push_bar(bar) {
            debug!(ts = bar.timestamp, "Replaced bar with same timestamp");
        }
        let features = self.strategy.evaluate(self.session.bars());
        self.session.set_features(features);
        let latest = self.session.features().last().cloned();

        let action = match latest.as_ref().filter(|f| is_warm(f)) {
            Some(f) => self.act(f).await?,
            None => None,
        };
        self.session.record_snapshot(bar.timestamp, bar.close);

        if let Some(features) = latest {
            if let Some(action) = &action {
                self.metrics
                    .record(MetricsEvent::Action {
                        session_id: self.session.id().to_string(),
                        action: action.clone(),
                        features: features.clone(),
                    })
                    .await;
            }
            self.metrics
                .record(MetricsEvent::Sample {
                    session_id: self.session.id().to_string(),
                    features,
                })
                .await;
        }
        Ok(action)
    }

    async fn act(&mut self, f: &FeatureBar) -> Result<Option<Action>> {
        if self.pending.is_some() {
            return Ok(self.resolve_pending(f).await);
        }

        let ground_long = self.orders.is_long(self.session.id()).await;
        let decision = decide(f.signal, f.close(), self.session.position(), ground_long)
            .inspect_err(|e| error!(error = %e, ts = f.timestamp(), "Fatal session state"))?;

        Ok(match decision {
            Decision::Hold => None,
            Decision::Buy => self.buy(f).await,
            Decision::Sell(trigger) => self.sell(f, trigger).await,
        })
    }

    /// Look up the order placed on an earlier bar. A fill the order sync has
    /// settled since is applied on this bar; until then the trader holds.
    async fn resolve_pending(&mut self, f: &FeatureBar) -> Option<Action> {
        let pending = self.pending.take()?;
        let Some(record) = self.orders.order(&pending.order_id).await else {
            warn!(order_id = %pending.order_id, "Pending order vanished from the order book");
            return None;
        };
        match record.status {
            OrderStatus::Filled => {
                info!(order_id = %record.order_id, "Pending order filled");
                self.apply_fill(f, &record, pending.trigger, pending.atr)
            }
            status if status.is_final() => {
                info!(order_id = %record.order_id, %status, "Pending order ended without a fill");
                None
            }
            _ => {
                debug!(order_id = %record.order_id, "Order still pending; holding");
                self.pending = Some(pending);
                None
            }
        }
    }

    async fn buy(&mut self, f: &FeatureBar) -> Option<Action> {
        if f.atr <= 0.0 {
            warn!(ts = f.timestamp(), "ATR is zero; cannot place bracket, holding");
            return None;
        }
        let balance = match self.orders.client().available_balance(&self.quote_coin).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "Balance query failed; holding");
                return None;
            }
        };
        let quote = entry_quote(balance, self.session.cash);
        if quote <= 0.0 {
            info!(coin = %self.quote_coin, balance, cash = self.session.cash, "Nothing to spend; holding");
            return None;
        }

        let close = f.close();
        let quantity = quote / close;
        let (stop_loss, take_profit) = self.risk.bracket(close, f.atr);
        let request = OrderRequest::market(self.session.symbol(), Side::Buy, quantity)
            .with_bracket(stop_loss, take_profit);

        let record = self.place(&request).await?;
        self.settled(f, &record, Trigger::Signal, f.atr)
    }

    async fn sell(&mut self, f: &FeatureBar, trigger: Trigger) -> Option<Action> {
        let quantity = match self.orders.last_filled_buy(self.session.id()).await {
            Some(buy) => buy.quantity,
            None => self.session.position.quantity(),
        };
        if quantity <= 0.0 {
            warn!(%trigger, "Nothing to sell; holding");
            return None;
        }

        let request = OrderRequest::market(self.session.symbol(), Side::Sell, quantity);
        let record = self.place(&request).await?;
        self.settled(f, &record, trigger, f.atr)
    }

    /// Act on a freshly placed order: apply it when filled, remember it when
    /// the venue has not settled it yet.
    fn settled(
        &mut self,
        f: &FeatureBar,
        record: &OrderRecord,
        trigger: Trigger,
        atr: f64,
    ) -> Option<Action> {
        match record.status {
            OrderStatus::Filled => self.apply_fill(f, record, trigger, atr),
            status if status.is_final() => {
                info!(order_id = %record.order_id, %status, "Order not filled; holding");
                None
            }
            status => {
                info!(order_id = %record.order_id, %status, "Order pending; holding until it settles");
                self.pending = Some(PendingOrder {
                    order_id: record.order_id.clone(),
                    trigger,
                    atr,
                });
                None
            }
        }
    }

    /// Move cash and position by a filled order and append it to the ledger.
    fn apply_fill(
        &mut self,
        f: &FeatureBar,
        record: &OrderRecord,
        trigger: Trigger,
        atr: f64,
    ) -> Option<Action> {
        let Some(price) = record.fill_price() else {
            warn!(order_id = %record.order_id, "Filled order reports no quote quantity; holding");
            return None;
        };
        let quantity = record.quantity;

        let action = match record.side {
            Side::Buy => {
                self.session.cash -= record.filled_quote;
                let open = self.risk.open(price, quantity, atr, f.timestamp());
                self.session.position = PositionState::Long(open);
                info!(
                    price,
                    qty = quantity,
                    stop_loss = open.stop_loss,
                    take_profit = open.take_profit,
                    "Entered long"
                );
                Action {
                    timestamp: f.timestamp(),
                    side: Side::Buy,
                    trigger,
                    price,
                    quantity,
                    profit: None,
                    portfolio_value: self.session.cash + quantity * f.close(),
                }
            }
            Side::Sell => {
                let proceeds = record.filled_quote;
                let profit = self
                    .session
                    .last_buy()
                    .map(|buy| proceeds - buy.price * buy.quantity);
                self.session.cash += proceeds;
                self.session.position = PositionState::Flat;
                info!(price, qty = quantity, %trigger, profit = ?profit, "Closed long");
                Action {
                    timestamp: f.timestamp(),
                    side: Side::Sell,
                    trigger,
                    price,
                    quantity,
                    profit,
                    portfolio_value: self.session.cash,
                }
            }
            Side::Hold => return None,
        };
        self.session.record_action(action.clone());
        Some(action)
    }

    async fn place(&self, request: &OrderRequest) -> Option<OrderRecord> {
        match self.orders.place(self.session.id(), request).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(side = %request.side, error = %e, "Order placement failed; holding");
                None
            }
        }
    }
}

/// Quote to spend on an entry: capped at [`LIVE_QUOTE_CAP`], and kept
/// [`COST_HEADROOM`] below both the venue balance and the session's cash so
/// slippage and fees still fit.
pub fn entry_quote(balance: f64, cash: f64) -> f64 {
    let spendable = balance.min(cash).max(0.0) / (1.0 + COST_HEADROOM);
    spendable.min(LIVE_QUOTE_CAP)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use common::OpenPosition;

    fn long(stop_loss: f64, take_profit: f64) -> PositionState {
        PositionState::Long(OpenPosition {
            entry_price: 100.0,
            stop_loss,
            take_profit,
            quantity: 1.0,
            opened_at: 0,
        })
    }

    #[test]
    fn flat_buy_signal_buys() {
        let d = decide(1, 100.0, &PositionState::Flat, false).unwrap();
        assert_eq!(d, Decision::Buy);
    }

    #[test]
    fn order_book_long_blocks_a_second_buy() {
        let d = decide(1, 100.0, &long(90.0, 110.0), true).unwrap();
        assert_eq!(d, Decision::Hold);
    }

    #[test]
    fn exit_order_is_stop_then_target_then_signal() {
        assert_eq!(
            decide(-1, 85.0, &long(90.0, 110.0), true).unwrap(),
            Decision::Sell(Trigger::StopLoss)
        );
        assert_eq!(
            decide(0, 115.0, &long(90.0, 110.0), true).unwrap(),
            Decision::Sell(Trigger::TakeProfit)
        );
        assert_eq!(
            decide(-1, 100.0, &long(90.0, 110.0), true).unwrap(),
            Decision::Sell(Trigger::Signal)
        );
        assert_eq!(decide(0, 100.0, &long(90.0, 110.0), true).unwrap(), Decision::Hold);
    }

    #[test]
    fn order_book_long_alone_can_sell_on_signal() {
        let d = decide(-1, 100.0, &PositionState::Flat, true).unwrap();
        assert_eq!(d, Decision::Sell(Trigger::Signal));
        // Flat on both sides: a sell signal has nothing to close.
        let d = decide(-1, 100.0, &PositionState::Flat, false).unwrap();
        assert_eq!(d, Decision::Hold);
    }

    #[test]
    fn diverged_views_are_fatal() {
        // Locally long and at the target, the book says flat, and the signal says buy.
        let err = decide(1, 120.0, &long(90.0, 110.0), false).unwrap_err();
        assert!(matches!(err, Error::ConsistencyViolation(_)));
    }

    #[test]
    fn local_long_with_flat_book_rebuys_on_signal() {
        let d = decide(1, 100.0, &long(90.0, 110.0), false).unwrap();
        assert_eq!(d, Decision::Buy);
    }

    #[test]
    fn entry_quote_is_capped_and_leaves_room_for_costs() {
        assert_eq!(entry_quote(10_000.0, 1_000.0), LIVE_QUOTE_CAP);
        assert!((entry_quote(50.0, 1_000.0) - 50.0 / 1.01).abs() < 1e-12);
        // Session cash binds when it is below the venue balance.
        assert!((entry_quote(10_000.0, 30.0) - 30.0 / 1.01).abs() < 1e-12);
        assert_eq!(entry_quote(0.0, 1_000.0), 0.0);
        assert_eq!(entry_quote(50.0, -5.0), 0.0);
    }

    #[tokio::test]
    async fn diverged_state_ends_on_bar_with_an_error() {
        use crate::metrics::ChannelSink;
        use paper::PaperClient;
        use strategy::{StrategyParameters, WeightedStrategy};

        let params = StrategyParameters {
            ema_short_period: 3,
            ema_long_period: 6,
            ma_short_period: 2,
            ma_long_period: 3,
            rsi_period: 3,
            atr_period: 3,
            macd_short_period: 3,
            macd_long_period: 6,
            macd_signal_period: 3,
            bollinger_period: 3,
            stochastic_k_period: 3,
            stochastic_d_period: 2,
            trend_weight: 0.0,
            rsi_weight: 0.0,
            macd_weight: 0.0,
            bollinger_weight: 0.0,
            stochastic_weight: 0.0,
            ..StrategyParameters::default()
        };
        let paper = Arc::new(PaperClient::new(10_000.0, "USDT", 0.0));
        let (sink, _rx) = ChannelSink::new(256);
        let mut trader = Trader::new(
            TraderConfig {
                symbol: "BTCUSDT".into(),
                quote_coin: "USDT".into(),
                initial_capital: 1_000.0,
                risk: RiskConfig::default(),
                periods_per_year: 252.0,
            },
            Arc::new(WeightedStrategy::new("ema", params).unwrap()),
            OrderManager::new(paper.clone()),
            Arc::new(sink),
        );

        // Falling then rising closes; bar 13 (close 95) carries the first buy signal.
        let bars: Vec<PriceBar> = (0..14)
            .map(|i| {
                let c = if i < 10 { 100.0 - i as f64 } else { 91.0 + (i - 9) as f64 };
                PriceBar::new(i as i64 * 60_000, c, c + 1.0, c - 1.0, c, 1.0)
            })
            .collect();
        for bar in &bars[..13] {
            paper.update_price("BTCUSDT", bar.close).await;
            assert!(trader.on_bar(*bar).await.unwrap().is_none());
        }

        // Locally long with the target already passed while the book is flat.
        trader.session.position = long(70.0, 90.0);
        let err = trader.on_bar(bars[13]).await.unwrap_err();
        assert!(matches!(err, Error::ConsistencyViolation(_)));
        assert!(trader.session().actions().is_empty());
    }
}
