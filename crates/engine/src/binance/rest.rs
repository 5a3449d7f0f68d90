use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

use common::{
    Error, ExchangeClient, OrderRequest, OrderStatus, PriceBar, Result, Side, Timeframe,
};

const BASE_URL: &str = "https://api.binance.com";

/// Binance caps a single klines request at 1000 bars.
const MAX_KLINES: usize = 1000;

/// REST API client for Binance spot. Used for history, order placement and
/// account queries.
pub struct BinanceClient {
    api_key: String,
    secret: String,
    http: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            http,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at another host (testnet).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn sign(&self, query: &str) -> String {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_query(&self, params: &str) -> String {
        let ts = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={ts}")
        } else {
            format!("{params}&timestamp={ts}")
        };
        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    async fn public_get(&self, path: &str, params: &str) -> Result<String> {
        let url = format!("{}{path}?{params}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn signed_get(&self, path: &str, params: &str) -> Result<String> {
        let url = format!("{}{path}?{}", self.base_url, self.signed_query(params));
        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn signed_post(&self, path: &str, params: &str) -> Result<String> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(self.signed_query(params))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn query_order(&self, symbol: &str, order_id: &str) -> Result<QueryOrderResponse> {
        let params = format!("symbol={symbol}&orderId={order_id}");
        let body = self.signed_get("/api/v3/order", &params).await?;
        serde_json::from_str(&body).map_err(|e| Error::Exchange(e.to_string()))
    }
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
    if !status.is_success() {
        return Err(Error::Exchange(format!("HTTP {status}: {body}")));
    }
    Ok(body)
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>> {
        let limit = limit.clamp(1, MAX_KLINES);
        let params = format!("symbol={symbol}&interval={}&limit={limit}", timeframe.as_str());
        let body = self.public_get("/api/v3/klines", &params).await?;
        parse_klines(&body)
    }

    async fn submit_market_order(&self, order: &OrderRequest) -> Result<String> {
        let side = match order.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
            Side::Hold => {
                return Err(Error::Exchange("cannot submit a HOLD order".to_string()));
            }
        };
        let params = format!(
            "symbol={}&side={side}&type=MARKET&quantity={}",
            order.symbol, order.quantity
        );

        // Spot market orders carry no bracket; the trader watches the levels.
        debug!(
            symbol = %order.symbol,
            side,
            qty = order.quantity,
            stop_loss = ?order.stop_loss,
            take_profit = ?order.take_profit,
            "Submitting order to Binance"
        );
        let body = self.signed_post("/api/v3/order", &params).await?;
        let resp: NewOrderResponse =
            serde_json::from_str(&body).map_err(|e| Error::Exchange(e.to_string()))?;
        Ok(resp.order_id.to_string())
    }

    async fn order_status(&self, symbol: &str, order_id: &str) -> Result<OrderStatus> {
        let resp = self.query_order(symbol, order_id).await?;
        Ok(parse_status(&resp.status))
    }

    async fn filled_quote_quantity(&self, symbol: &str, order_id: &str) -> Result<f64> {
        let resp = self.query_order(symbol, order_id).await?;
        parse_decimal(&resp.cummulative_quote_qty)
    }

    async fn available_balance(&self, coin: &str) -> Result<f64> {
        let body = self.signed_get("/api/v3/account", "").await?;
        let account: AccountResponse =
            serde_json::from_str(&body).map_err(|e| Error::Exchange(e.to_string()))?;
        match account.balances.iter().find(|b| b.asset == coin) {
            Some(b) => parse_decimal(&b.free),
            None => Ok(0.0),
        }
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewOrderResponse {
    order_id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryOrderResponse {
    status: String,
    cummulative_quote_qty: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    balances: Vec<Balance>,
}

#[derive(Deserialize)]
struct Balance {
    asset: String,
    free: String,
}

fn parse_decimal(s: &str) -> Result<f64> {
    s.parse::<f64>()
        .map_err(|e| Error::Exchange(format!("bad decimal '{s}': {e}")))
}

/// Binance has more states than we track; expired orders are as dead as
/// canceled ones.
fn parse_status(s: &str) -> OrderStatus {
    match s {
        "FILLED" => OrderStatus::Filled,
        "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
        "CANCELED" | "PENDING_CANCEL" | "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Canceled,
        "REJECTED" => OrderStatus::Rejected,
        _ => OrderStatus::New,
    }
}

/// Klines arrive as arrays: `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
fn parse_klines(body: &str) -> Result<Vec<PriceBar>> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;
    rows.iter()
        .map(|row| {
            let field = |i: usize| -> Result<f64> {
                match row.get(i) {
                    Some(Value::String(s)) => parse_decimal(s),
                    Some(Value::Number(n)) => n
                        .as_f64()
                        .ok_or_else(|| Error::Exchange(format!("bad kline field {i}"))),
                    _ => Err(Error::Exchange(format!("kline row missing field {i}"))),
                }
            };
            let timestamp = row
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| Error::Exchange("kline row missing open time".to_string()))?;
            Ok(PriceBar::new(
                timestamp,
                field(1)?,
                field(2)?,
                field(3)?,
                field(4)?,
                field(5)?,
            ))
        })
        .collect()
}
