use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use common::{ExchangeClient, OrderRequest, OrderStatus, Result, Side};

/// One order placed on behalf of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub session_id: String,
    pub symbol: String,
    pub side: Side,
    /// Base asset quantity requested.
    pub quantity: f64,
    pub status: OrderStatus,
    /// Quote currency actually filled.
    pub filled_quote: f64,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Average fill price, once anything has filled.
    pub fn fill_price(&self) -> Option<f64> {
        if self.quantity > 0.0 && self.filled_quote > 0.0 {
            Some(self.filled_quote / self.quantity)
        } else {
            None
        }
    }
}

/// Places orders through an `ExchangeClient` and keeps the per-session order
/// book that the trader treats as ground truth.
///
/// This is the ONLY component that calls `ExchangeClient::submit_market_order`.
#[derive(Clone)]
pub struct OrderManager {
    client: Arc<dyn ExchangeClient>,
    records: Arc<RwLock<Vec<OrderRecord>>>,
}

impl OrderManager {
    pub fn new(client: Arc<dyn ExchangeClient>) -> Self {
        Self {
            client,
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn client(&self) -> Arc<dyn ExchangeClient> {
        self.client.clone()
    }

    /// Submit a market order, read its status and filled quote once, and
    /// store the record. A failed status query leaves the record `New` for
    /// the sync poller to settle.
    pub async fn place(&self, session_id: &str, request: &OrderRequest) -> Result<OrderRecord> {
        info!(
            symbol = %request.symbol,
            side = %request.side,
            qty = request.quantity,
            "Placing market order"
        );
        let order_id = self.client.submit_market_order(request).await?;

        let mut record = OrderRecord {
            order_id,
            session_id: session_id.to_string(),
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            status: OrderStatus::New,
            filled_quote: 0.0,
            take_profit: request.take_profit,
            stop_loss: request.stop_loss,
            created_at: Utc::now(),
        };
        if let Err(e) = self.settle(&mut record).await {
            warn!(order_id = %record.order_id, error = %e, "Order status unavailable");
        }

        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn settle(&self, record: &mut OrderRecord) -> Result<()> {
        record.status = self
            .client
            .order_status(&record.symbol, &record.order_id)
            .await?;
        if matches!(
            record.status,
            OrderStatus::Filled | OrderStatus::PartiallyFilled
        ) {
            record.filled_quote = self
                .client
                .filled_quote_quantity(&record.symbol, &record.order_id)
                .await?;
        }
        Ok(())
    }

    /// Every record of a session, oldest first.
    pub async fn records(&self, session_id: &str) -> Vec<OrderRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    pub async fn order(&self, order_id: &str) -> Option<OrderRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.order_id == order_id)
            .cloned()
    }

    /// Most recent order of a session, whatever its status.
    pub async fn last_order(&self, session_id: &str) -> Option<OrderRecord> {
        self.records
            .read()
            .await
            .iter()
            .rev()
            .find(|r| r.session_id == session_id)
            .cloned()
    }

    /// Most recent filled order of a session.
    pub async fn last_filled(&self, session_id: &str) -> Option<OrderRecord> {
        self.records
            .read()
            .await
            .iter()
            .rev()
            .find(|r| r.session_id == session_id && r.status == OrderStatus::Filled)
            .cloned()
    }

    pub async fn last_filled_buy(&self, session_id: &str) -> Option<OrderRecord> {
        self.records
            .read()
            .await
            .iter()
            .rev()
            .find(|r| {
                r.session_id == session_id && r.status == OrderStatus::Filled && r.side == Side::Buy
            })
            .cloned()
    }

    /// Ground truth: the session is long iff its last filled order was a buy.
    pub async fn is_long(&self, session_id: &str) -> bool {
        self.last_filled(session_id)
            .await
            .is_some_and(|r| r.side == Side::Buy)
    }

    /// Refresh every non-final order once. Returns how many changed.
    pub async fn sync_once(&self) -> usize {
        let pending: Vec<OrderRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| !r.status.is_final())
            .cloned()
            .collect();

        let mut changed = 0;
        for mut record in pending {
            let before = (record.status, record.filled_quote);
            if let Err(e) = self.settle(&mut record).await {
                warn!(order_id = %record.order_id, error = %e, "Order sync failed");
                continue;
            }
            if (record.status, record.filled_quote) == before {
                continue;
            }
            let mut records = self.records.write().await;
            if let Some(stored) = records.iter_mut().find(|r| r.order_id == record.order_id) {
                info!(order_id = %record.order_id, status = %record.status, "Order status updated");
                stored.status = record.status;
                stored.filled_quote = record.filled_quote;
                changed += 1;
            }
        }
        changed
    }

    /// Poll non-final orders forever. Call this inside a `tokio::spawn`.
    pub async fn run_sync(self, every: Duration) {
        info!(interval = ?every, "Order sync running");
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let changed = self.sync_once().await;
            if changed > 0 {
                info!(changed, "Order sync pass");
            }
            if Arc::strong_count(&self.records) == 1 {
                info!("Order book has no other owner; stopping sync");
                return;
            }
        }
    }
}
