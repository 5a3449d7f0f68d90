use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use common::{Action, FeatureBar};

/// What the trader reports while it runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricsEvent {
    /// A non-hold action together with the indicator snapshot behind it.
    Action {
        session_id: String,
        action: Action,
        features: FeatureBar,
    },
    /// The indicator snapshot of every processed bar.
    Sample {
        session_id: String,
        features: FeatureBar,
    },
}

/// Reporting handle injected into the trader.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record(&self, event: MetricsEvent);
}

/// Forwards events over a bounded channel. A closed receiver is ignored.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<MetricsEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MetricsEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MetricsSink for ChannelSink {
    async fn record(&self, event: MetricsEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("Metrics receiver closed; event dropped");
        }
    }
}
