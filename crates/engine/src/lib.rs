pub mod binance;
pub mod metrics;
pub mod orders;
pub mod session;
pub mod stream;
pub mod trader;

pub use binance::BinanceClient;
pub use metrics::{ChannelSink, MetricsEvent, MetricsSink};
pub use orders::{OrderManager, OrderRecord};
pub use session::{SessionView, TraderSession};
pub use stream::{bar_stream, BarStream};
pub use trader::{
    decide, entry_quote, Decision, SessionSummary, Trader, TraderConfig, COST_HEADROOM,
    LIVE_QUOTE_CAP,
};
