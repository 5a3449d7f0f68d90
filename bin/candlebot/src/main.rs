//! candlebot: backtest, sweep and trade a weighted multi-indicator strategy.
//!
//! Commands:
//! - `backtest` replays the strategy over a JSON bar file (or Binance history)
//! - `sweep` scores a list of parameter sets in parallel
//! - `trade` runs a paper or live session on a WebSocket bar feed

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use backtest::{best_trial, evaluate_trials, simulate, BacktestConfig};
use common::{Config, ExchangeClient, PriceBar, TradingMode};
use engine::{
    bar_stream, BarStream, BinanceClient, ChannelSink, MetricsEvent, OrderManager, Trader,
    TraderConfig,
};
use paper::PaperClient;
use risk::RiskConfig;
use strategy::{Strategy, StrategyParameters, WeightedStrategy};

#[derive(Parser)]
#[command(name = "candlebot", about = "Single-symbol candle trading engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the strategy over historical bars and print the result.
    Backtest {
        /// JSON array of price bars. Without it, bars are fetched from Binance.
        #[arg(long)]
        bars: Option<PathBuf>,

        /// Number of bars to fetch when no file is given.
        #[arg(long, default_value_t = 1000)]
        limit: usize,

        /// Strategy parameters (.json or .toml). Overrides STRATEGY_PARAMS_PATH.
        #[arg(long)]
        params: Option<PathBuf>,

        /// Print the full action ledger and snapshots, not just the summary.
        #[arg(long, default_value_t = false)]
        full: bool,
    },
    /// Score parameter sets by Sharpe ratio.
    Sweep {
        /// JSON array of price bars.
        #[arg(long)]
        bars: PathBuf,

        /// JSON array of strategy parameter objects.
        #[arg(long)]
        trials: PathBuf,
    },
    /// Trade the configured symbol on the configured bar stream.
    Trade {
        /// Strategy parameters (.json or .toml). Overrides STRATEGY_PARAMS_PATH.
        #[arg(long)]
        params: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;

    match cli.command {
        Commands::Backtest {
            bars,
            limit,
            params,
            full,
        } => run_backtest(&cfg, bars.as_deref(), limit, params.as_deref(), full).await,
        Commands::Sweep { bars, trials } => run_sweep(&cfg, &bars, &trials),
        Commands::Trade { params } => run_trade(&cfg, params.as_deref()).await,
    }
}

fn load_params(cfg: &Config, flag: Option<&Path>) -> Result<StrategyParameters> {
    let path = flag
        .map(Path::to_path_buf)
        .or_else(|| cfg.strategy_params_path.as_ref().map(PathBuf::from));
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading strategy parameters");
            StrategyParameters::load(&path)
                .with_context(|| format!("loading parameters from {}", path.display()))
        }
        None => Ok(StrategyParameters::default()),
    }
}

fn load_bars(path: &Path) -> Result<Vec<PriceBar>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading bars from {}", path.display()))?;
    let bars: Vec<PriceBar> = serde_json::from_str(&text)
        .with_context(|| format!("parsing bars from {}", path.display()))?;
    if bars.windows(2).any(|w| w[1].timestamp <= w[0].timestamp) {
        bail!("bars in {} are not strictly increasing in time", path.display());
    }
    Ok(bars)
}

fn backtest_config(cfg: &Config) -> BacktestConfig {
    BacktestConfig {
        initial_capital: cfg.initial_capital,
        periods_per_year: cfg.periods_per_year,
        ..BacktestConfig::default()
    }
}

async fn run_backtest(
    cfg: &Config,
    bars_path: Option<&Path>,
    limit: usize,
    params_path: Option<&Path>,
    full: bool,
) -> Result<()> {
    let params = load_params(cfg, params_path)?;
    let bars = match bars_path {
        Some(path) => load_bars(path)?,
        None => {
            info!(symbol = %cfg.symbol, timeframe = %cfg.timeframe, limit, "Fetching history from Binance");
            // Klines are public; keys are only sent on signed endpoints.
            let client = BinanceClient::new(
                cfg.binance_api_key.clone().unwrap_or_default(),
                cfg.binance_secret.clone().unwrap_or_default(),
            )?;
            client.fetch_bars(&cfg.symbol, cfg.timeframe, limit).await?
        }
    };
    info!(bars = bars.len(), "Running backtest");

    let result = simulate(&bars, &params, &backtest_config(cfg))?;
    let summary = result.summary();
    info!(
        final_capital = summary.final_capital,
        sharpe = summary.sharpe_ratio,
        max_drawdown_pct = summary.max_drawdown_pct,
        win_rate_pct = summary.win_rate_pct,
        orders = summary.order_count,
        "Backtest complete"
    );

    let output = if full {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string_pretty(summary)?
    };
    println!("{output}");
    Ok(())
}

fn run_sweep(cfg: &Config, bars_path: &Path, trials_path: &Path) -> Result<()> {
    let bars = load_bars(bars_path)?;
    let text = std::fs::read_to_string(trials_path)
        .with_context(|| format!("reading trials from {}", trials_path.display()))?;
    let trials: Vec<StrategyParameters> = serde_json::from_str(&text)
        .with_context(|| format!("parsing trials from {}", trials_path.display()))?;
    if trials.is_empty() {
        bail!("no trials in {}", trials_path.display());
    }

    let evaluated = evaluate_trials(&bars, &trials, &backtest_config(cfg));
    for (i, trial) in evaluated.iter().enumerate() {
        match &trial.result {
            Ok(r) => println!("{i}\t{:.4}\t{:.2}", trial.fitness(), r.final_capital()),
            Err(e) => println!("{i}\t-inf\t{e}"),
        }
    }
    if let Some(best) = best_trial(&evaluated) {
        info!(fitness = best.fitness(), "Best trial");
        println!("{}", serde_json::to_string_pretty(&best.params)?);
    }
    Ok(())
}

async fn run_trade(cfg: &Config, params_path: Option<&Path>) -> Result<()> {
    let params = load_params(cfg, params_path)?;
    let strategy: Arc<dyn Strategy> = Arc::new(WeightedStrategy::new("weighted", params)?);

    // ── Exchange client (injected based on TRADING_MODE) ──────────────────────
    let mut paper: Option<Arc<PaperClient>> = None;
    let client: Arc<dyn ExchangeClient> = match cfg.trading_mode {
        TradingMode::Live => {
            info!("Live trading mode, using BinanceClient");
            let (Some(key), Some(secret)) = (&cfg.binance_api_key, &cfg.binance_secret) else {
                bail!("live mode needs BINANCE_API_KEY and BINANCE_SECRET");
            };
            Arc::new(BinanceClient::new(key.as_str(), secret.as_str())?)
        }
        TradingMode::Paper => {
            info!(slippage_bps = cfg.paper_slippage_bps, "Paper trading mode, using PaperClient");
            let client = Arc::new(PaperClient::new(
                cfg.initial_capital,
                cfg.quote_coin.clone(),
                cfg.paper_slippage_bps,
            ));
            paper = Some(client.clone());
            client
        }
    };

    // ── Order book + sync poller ──────────────────────────────────────────────
    let orders = OrderManager::new(client);
    tokio::spawn(
        orders
            .clone()
            .run_sync(Duration::from_secs(cfg.order_sync_interval_secs.max(1))),
    );

    // ── Metrics: log every event as one JSON line ────────────────────────────
    let (sink, mut metrics_rx) = ChannelSink::new(1024);
    tokio::spawn(async move {
        while let Some(event) = metrics_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) if matches!(event, MetricsEvent::Action { .. }) => {
                    info!(target: "candlebot::metrics", "{line}")
                }
                Ok(line) => tracing::debug!(target: "candlebot::metrics", "{line}"),
                Err(e) => warn!(error = %e, "Failed to encode metrics event"),
            }
        }
    });

    // ── Bar stream ────────────────────────────────────────────────────────────
    let (stream, bar_rx) = BarStream::new(cfg.bar_stream_url.clone());
    tokio::spawn(stream.run());

    let trader = Trader::new(
        TraderConfig {
            symbol: cfg.symbol.clone(),
            quote_coin: cfg.quote_coin.clone(),
            initial_capital: cfg.initial_capital,
            risk: RiskConfig::default(),
            periods_per_year: cfg.periods_per_year,
        },
        strategy,
        orders,
        Arc::new(sink),
    );

    let bars = bar_stream(bar_rx);
    let summary = match paper {
        // The paper venue fills at the latest close it has seen.
        Some(paper) => {
            let symbol = cfg.symbol.clone();
            let bars = bars.then(move |item| {
                let paper = paper.clone();
                let symbol = symbol.clone();
                async move {
                    if let Ok(bar) = &item {
                        paper.update_price(&symbol, bar.close).await;
                    }
                    item
                }
            });
            trader.run(bars).await?
        }
        None => trader.run(bars).await?,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
