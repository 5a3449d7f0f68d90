use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use url::Url;

use common::{Error, PriceBar, Result};

/// WebSocket price-bar feed.
///
/// Each text message is either a bare JSON `PriceBar` or a Binance kline
/// event (only closed klines are forwarded). The connection is made once:
/// a normal close ends the channel. A transport error or a close frame with
/// any other code is forwarded once and then the channel ends.
pub struct BarStream {
    url: String,
    bar_tx: mpsc::Sender<Result<PriceBar>>,
}

impl BarStream {
    pub fn new(url: impl Into<String>) -> (Self, mpsc::Receiver<Result<PriceBar>>) {
        let (bar_tx, bar_rx) = mpsc::channel(256);
        (
            Self {
                url: url.into(),
                bar_tx,
            },
            bar_rx,
        )
    }

    /// Call this inside a `tokio::spawn`.
    pub async fn run(self) {
        info!(url = %self.url, "Connecting to bar stream");
        match self.connect_once().await {
            Ok(()) => info!(url = %self.url, "Bar stream closed cleanly"),
            Err(e) => {
                warn!(url = %self.url, error = %e, "Bar stream failed");
                let _ = self.bar_tx.send(Err(e)).await;
            }
        }
    }

    async fn connect_once(&self) -> Result<()> {
        let url = Url::parse(&self.url).map_err(|e| Error::WebSocket(e.to_string()))?;
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let (_, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;
            match msg {
                Message::Text(text) => match parse_bar_message(&text) {
                    Ok(Some(bar)) => {
                        if self.bar_tx.send(Ok(bar)).await.is_err() {
                            // Consumer is gone; nothing left to feed.
                            return Ok(());
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Failed to parse bar message"),
                },
                Message::Close(Some(frame)) if frame.code != CloseCode::Normal => {
                    return Err(Error::Stream(format!(
                        "closed with code {}: {}",
                        u16::from(frame.code),
                        frame.reason
                    )));
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        Ok(())
    }
}

/// Adapt the receiving end of a `BarStream` into a `Stream`.
pub fn bar_stream(rx: mpsc::Receiver<Result<PriceBar>>) -> impl Stream<Item = Result<PriceBar>> {
    futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
}

// ─── Message parsing ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct KlineWrapper {
    k: KlineData,
}

#[derive(Deserialize)]
struct KlineData {
    #[serde(rename = "t")]
    open_time_ms: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "x")]
    is_closed: bool,
}

/// `Ok(None)` for messages that carry no finished bar.
pub fn parse_bar_message(text: &str) -> Result<Option<PriceBar>> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    if value.get("e").and_then(|v| v.as_str()) == Some("kline") {
        let k = serde_json::from_value::<KlineWrapper>(value)?.k;
        if !k.is_closed {
            return Ok(None);
        }
        let num = |s: &str| {
            s.parse::<f64>()
                .map_err(|e| Error::Stream(format!("bad kline number '{s}': {e}")))
        };
        return Ok(Some(PriceBar::new(
            k.open_time_ms,
            num(&k.open)?,
            num(&k.high)?,
            num(&k.low)?,
            num(&k.close)?,
            num(&k.volume)?,
        )));
    }

    if value.get("timestamp").is_some() {
        return Ok(Some(serde_json::from_value(value)?));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bar_message() {
        let bar = parse_bar_message(
            r#"{"timestamp":1700000000000,"open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":3.0}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(bar.timestamp, 1_700_000_000_000);
        assert_eq!(bar.close, 1.5);
    }

    #[test]
    fn open_kline_is_skipped() {
        let msg = r#"{"e":"kline","k":{"t":1,"o":"1","h":"2","l":"0.5","c":"1.5","v":"3","x":false}}"#;
        assert!(parse_bar_message(msg).unwrap().is_none());
    }

    #[test]
    fn closed_kline_becomes_bar() {
        let msg = r#"{"e":"kline","E":2,"s":"BTCUSDT","k":{"t":60000,"T":119999,"o":"10","h":"12","l":"9","c":"11","v":"5","x":true}}"#;
        let bar = parse_bar_message(msg).unwrap().unwrap();
        assert_eq!(bar.timestamp, 60_000);
        assert_eq!(bar.high, 12.0);
        assert_eq!(bar.close, 11.0);
    }

    #[test]
    fn unrelated_and_broken_messages() {
        assert!(parse_bar_message(r#"{"result":null,"id":1}"#).unwrap().is_none());
        assert!(parse_bar_message("not json").is_err());
    }

    #[tokio::test]
    async fn channel_end_ends_the_stream() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(PriceBar::flat(1, 1.0))).await.unwrap();
        tx.send(Err(Error::Stream("boom".into()))).await.unwrap();
        drop(tx);

        let items: Vec<Result<PriceBar>> = bar_stream(rx).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    /// Serve one bar over a local WebSocket, then close with `code`.
    async fn serve_one_bar_then_close(code: CloseCode) -> String {
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let bar = r#"{"timestamp":60000,"open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":3.0}"#;
            ws.send(Message::Text(bar.to_string())).await.unwrap();
            let _ = ws
                .close(Some(CloseFrame {
                    code,
                    reason: "upstream going away".into(),
                }))
                .await;
            while ws.next().await.is_some() {}
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn normal_close_ends_the_channel_cleanly() {
        let url = serve_one_bar_then_close(CloseCode::Normal).await;
        let (stream, rx) = BarStream::new(url);
        tokio::spawn(stream.run());

        let items: Vec<Result<PriceBar>> = bar_stream(rx).collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().timestamp, 60_000);
    }

    #[tokio::test]
    async fn error_close_is_forwarded_as_stream_error() {
        let url = serve_one_bar_then_close(CloseCode::Error).await;
        let (stream, rx) = BarStream::new(url);
        tokio::spawn(stream.run());

        let items: Vec<Result<PriceBar>> = bar_stream(rx).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Stream(_))));
    }
}
