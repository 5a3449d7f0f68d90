use async_trait::async_trait;

use crate::{OrderRequest, OrderStatus, PriceBar, Result, Timeframe};

/// Capability interface over a trading venue.
///
/// `BinanceClient` implements this for live trading.
/// `PaperClient` implements this for simulation.
///
/// The variant is chosen once at session setup from `TradingMode`; nothing
/// downstream inspects which one it got.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Bulk historical fetch of the most recent `limit` bars, oldest first.
    async fn fetch_bars(&self, symbol: &str, timeframe: Timeframe, limit: usize)
        -> Result<Vec<PriceBar>>;

    /// Place a market order and return the venue's order id.
    async fn submit_market_order(&self, order: &OrderRequest) -> Result<String>;

    /// Current fill status of an order.
    async fn order_status(&self, symbol: &str, order_id: &str) -> Result<OrderStatus>;

    /// Quote currency amount that has been filled for an order.
    async fn filled_quote_quantity(&self, symbol: &str, order_id: &str) -> Result<f64>;

    /// Free balance for a coin (e.g. "USDT").
    async fn available_balance(&self, coin: &str) -> Result<f64>;
}
