use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::{
    Error, ExchangeClient, OrderRequest, OrderStatus, PriceBar, Result, Side, Timeframe,
};

/// Simulated exchange client for paper trading.
///
/// Market orders fill immediately at the latest known price with configurable
/// slippage, against in-memory balances. Orders the balances cannot cover are
/// recorded as rejected. No real orders are ever sent to Binance.
pub struct PaperClient {
    quote_coin: String,
    /// Free balance per coin.
    balances: Arc<RwLock<HashMap<String, f64>>>,
    /// Latest known price per symbol, updated via `update_price`.
    prices: Arc<RwLock<HashMap<String, f64>>>,
    /// Bars served by `fetch_bars`, per symbol.
    history: Arc<RwLock<HashMap<String, Vec<PriceBar>>>>,
    orders: Arc<RwLock<HashMap<String, PaperOrder>>>,
    /// Slippage in basis points applied to all fills.
    slippage_bps: f64,
}

#[derive(Debug, Clone)]
struct PaperOrder {
    status: OrderStatus,
    filled_quote: f64,
}

impl PaperClient {
    pub fn new(initial_quote: f64, quote_coin: impl Into<String>, slippage_bps: f64) -> Self {
        let quote_coin = quote_coin.into();
        info!(
            balance = initial_quote,
            coin = %quote_coin,
            slippage_bps = slippage_bps,
            "PaperClient initialized"
        );
        let mut balances = HashMap::new();
        balances.insert(quote_coin.clone(), initial_quote);
        Self {
            quote_coin,
            balances: Arc::new(RwLock::new(balances)),
            prices: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(HashMap::new())),
            orders: Arc::new(RwLock::new(HashMap::new())),
            slippage_bps,
        }
    }

    /// Update the latest price for a symbol (called for every incoming bar).
    pub async fn update_price(&self, symbol: &str, price: f64) {
        self.prices.write().await.insert(symbol.to_string(), price);
    }

    /// Preload the bars `fetch_bars` serves. The last close becomes the
    /// current price.
    pub async fn load_history(&self, symbol: &str, bars: Vec<PriceBar>) {
        if let Some(last) = bars.last() {
            self.update_price(symbol, last.close).await;
        }
        self.history.write().await.insert(symbol.to_string(), bars);
    }

    fn base_coin<'a>(&self, symbol: &'a str) -> Result<&'a str> {
        symbol
            .strip_suffix(self.quote_coin.as_str())
            .filter(|base| !base.is_empty())
            .ok_or_else(|| {
                Error::Exchange(format!(
                    "symbol '{symbol}' is not quoted in {}",
                    self.quote_coin
                ))
            })
    }

    async fn record(&self, status: OrderStatus, filled_quote: f64) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.orders.write().await.insert(
            id.clone(),
            PaperOrder {
                status,
                filled_quote,
            },
        );
        id
    }

    async fn order(&self, order_id: &str) -> Result<PaperOrder> {
        self.orders
            .read()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| Error::Exchange(format!("unknown paper order '{order_id}'")))
    }
}

#[async_trait]
impl ExchangeClient for PaperClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>> {
        let history = self.history.read().await;
        let bars = history.get(symbol).map(Vec::as_slice).unwrap_or_default();
        let start = bars.len().saturating_sub(limit);
        Ok(bars[start..].to_vec())
    }

    async fn submit_market_order(&self, order: &OrderRequest) -> Result<String> {
        let base = self.base_coin(&order.symbol)?.to_string();
        let mid_price = self
            .prices
            .read()
            .await
            .get(&order.symbol)
            .copied()
            .ok_or_else(|| {
                Error::Exchange(format!(
                    "PaperClient has no price for '{}'. Ensure bars are flowing.",
                    order.symbol
                ))
            })?;

        // Apply slippage: buys pay more, sells receive less
        let slip = self.slippage_bps / 10_000.0;
        let fill_price = match order.side {
            Side::Buy => mid_price * (1.0 + slip),
            Side::Sell => mid_price * (1.0 - slip),
            Side::Hold => return Err(Error::Exchange("cannot submit a HOLD order".to_string())),
        };
        let quote_amount = fill_price * order.quantity;

        let mut balances = self.balances.write().await;
        let (spend_coin, spend) = match order.side {
            Side::Buy => (self.quote_coin.clone(), quote_amount),
            _ => (base.clone(), order.quantity),
        };
        let available = balances.get(&spend_coin).copied().unwrap_or(0.0);
        if order.quantity <= 0.0 || spend > available {
            drop(balances);
            warn!(
                symbol = %order.symbol,
                side = %order.side,
                needed = spend,
                available,
                "Paper order rejected: insufficient balance"
            );
            return Ok(self.record(OrderStatus::Rejected, 0.0).await);
        }

        let (receive_coin, receive) = match order.side {
            Side::Buy => (base, order.quantity),
            _ => (self.quote_coin.clone(), quote_amount),
        };
        *balances.entry(spend_coin).or_insert(0.0) -= spend;
        *balances.entry(receive_coin).or_insert(0.0) += receive;
        drop(balances);

        debug!(
            symbol = %order.symbol,
            side = %order.side,
            mid = mid_price,
            fill = fill_price,
            qty = order.quantity,
            "Paper fill simulated"
        );
        Ok(self.record(OrderStatus::Filled, quote_amount).await)
    }

    async fn order_status(&self, _symbol: &str, order_id: &str) -> Result<OrderStatus> {
        Ok(self.order(order_id).await?.status)
    }

    async fn filled_quote_quantity(&self, _symbol: &str, order_id: &str) -> Result<f64> {
        Ok(self.order(order_id).await?.filled_quote)
    }

    async fn available_balance(&self, coin: &str) -> Result<f64> {
        Ok(self.balances.read().await.get(coin).copied().unwrap_or(0.0))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn client_at(price: f64, slippage_bps: f64) -> PaperClient {
        let client = PaperClient::new(10_000.0, "USDT", slippage_bps);
        client.update_price("BTCUSDT", price).await;
        client
    }

    #[tokio::test]
    async fn paper_buy_fill_applies_positive_slippage() {
        let client = client_at(1000.0, 10.0).await; // 10 bps
        let order = OrderRequest::market("BTCUSDT", Side::Buy, 0.01);
        let id = client.submit_market_order(&order).await.unwrap();

        assert_eq!(client.order_status("BTCUSDT", &id).await.unwrap(), OrderStatus::Filled);
        let quote = client.filled_quote_quantity("BTCUSDT", &id).await.unwrap();
        let expected = 1000.0 * (1.0 + 10.0 / 10_000.0) * 0.01;
        assert!(
            (quote - expected).abs() < 1e-9,
            "Buy filled quote {quote}, expected {expected}"
        );
    }

    #[tokio::test]
    async fn paper_sell_fill_applies_negative_slippage() {
        let client = client_at(1000.0, 10.0).await;

        // First buy, then sell
        let buy = OrderRequest::market("BTCUSDT", Side::Buy, 0.01);
        client.submit_market_order(&buy).await.unwrap();

        let sell = OrderRequest::market("BTCUSDT", Side::Sell, 0.01);
        let id = client.submit_market_order(&sell).await.unwrap();
        let quote = client.filled_quote_quantity("BTCUSDT", &id).await.unwrap();

        let expected = 1000.0 * (1.0 - 10.0 / 10_000.0) * 0.01;
        assert!((quote - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn balances_move_with_fills() {
        let client = client_at(500.0, 0.0).await;
        let buy = OrderRequest::market("BTCUSDT", Side::Buy, 2.0);
        client.submit_market_order(&buy).await.unwrap();

        assert_eq!(client.available_balance("USDT").await.unwrap(), 9_000.0);
        assert_eq!(client.available_balance("BTC").await.unwrap(), 2.0);

        let sell = OrderRequest::market("BTCUSDT", Side::Sell, 2.0);
        client.submit_market_order(&sell).await.unwrap();
        assert_eq!(client.available_balance("USDT").await.unwrap(), 10_000.0);
        assert_eq!(client.available_balance("BTC").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn uncovered_orders_are_rejected() {
        let client = client_at(500.0, 0.0).await;
        let sell = OrderRequest::market("BTCUSDT", Side::Sell, 1.0);
        let id = client.submit_market_order(&sell).await.unwrap();
        assert_eq!(client.order_status("BTCUSDT", &id).await.unwrap(), OrderStatus::Rejected);
        assert_eq!(client.filled_quote_quantity("BTCUSDT", &id).await.unwrap(), 0.0);

        let buy = OrderRequest::market("BTCUSDT", Side::Buy, 100.0);
        let id = client.submit_market_order(&buy).await.unwrap();
        assert_eq!(client.order_status("BTCUSDT", &id).await.unwrap(), OrderStatus::Rejected);
        assert_eq!(client.available_balance("USDT").await.unwrap(), 10_000.0);
    }

    #[tokio::test]
    async fn missing_price_is_an_error() {
        let client = PaperClient::new(10_000.0, "USDT", 0.0);
        let buy = OrderRequest::market("ETHUSDT", Side::Buy, 1.0);
        assert!(client.submit_market_order(&buy).await.is_err());
        assert!(client.order_status("ETHUSDT", "nope").await.is_err());
    }

    #[tokio::test]
    async fn fetch_bars_returns_the_tail() {
        let client = PaperClient::new(10_000.0, "USDT", 0.0);
        let bars: Vec<PriceBar> = (0..10).map(|i| PriceBar::flat(i, 100.0 + i as f64)).collect();
        client.load_history("BTCUSDT", bars).await;

        let tail = client.fetch_bars("BTCUSDT", Timeframe::M1, 3).await.unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].timestamp, 7);
        assert!(client.fetch_bars("ETHUSDT", Timeframe::M1, 3).await.unwrap().is_empty());

        // The last close is now the paper price.
        let buy = OrderRequest::market("BTCUSDT", Side::Buy, 1.0);
        let id = client.submit_market_order(&buy).await.unwrap();
        assert_eq!(client.filled_quote_quantity("BTCUSDT", &id).await.unwrap(), 109.0);
    }
}
