// =============================================================================
// FX MACross Bot — Main Entry Point
// =============================================================================
//
// Backtests the MACross strategy over a historical tick file against the
// paper exchange.  The head of the file primes the indicators; the rest is
// replayed through the feed queue, one tick at a time, to the exchange (for
// marking) and then to the strategy.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod exchange;
mod exit;
mod feed;
mod indicators;
mod market_data;
mod notify;
mod risk;
mod runtime_config;
mod strategy;
mod types;

use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::exchange::PaperExchange;
use crate::feed::{FeedError, Ticker, Watchdog};
use crate::market_data::ReplaySource;
use crate::runtime_config::RuntimeConfig;
use crate::strategy::StrategyController;

const DEFAULT_CONFIG_PATH: &str = "fxbot_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        FX MACross Bot — Backtest Starting               ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("FXBOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config_path, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override instrument from env if available.
    if let Ok(instrument) = std::env::var("FXBOT_INSTRUMENT") {
        let instrument = instrument.trim().to_uppercase();
        if !instrument.is_empty() {
            config.instrument = instrument;
        }
    }
    config.validate().context("invalid configuration")?;

    let replay_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FXBOT_REPLAY_FILE").ok())
        .context("usage: fx-macross-bot <tick-file.csv> (or set FXBOT_REPLAY_FILE)")?;

    info!(
        instrument = %config.instrument,
        candle_minutes = config.candle_minutes,
        risk_percent = config.strategy.risk_percent,
        stop_mode = %config.exits.stop_mode,
        replay = %replay_path,
        "Configured backtest"
    );

    // ── 2. Exchange & strategy ───────────────────────────────────────────
    let mut source = ReplaySource::open(&replay_path)?;
    let exchange = Arc::new(PaperExchange::new(
        config.instrument.clone(),
        config.paper.leverage,
        config.paper.starting_balance,
    ));
    let controller = Arc::new(Mutex::new(StrategyController::new(
        &config,
        exchange.clone(),
    )));

    // ── 3. Warm-up history from the head of the file ─────────────────────
    let warmup = controller.lock().warmup_candle_count();
    let history = source
        .take_candles(warmup, config.candle_minutes)
        .context("failed to build warm-up candles")?;
    exchange.load_history(history);

    // ── 4. Feed: replay producer -> bounded queue -> ticker ──────────────
    let (tx, rx) = feed::channel(config.feed.queue_capacity);
    let producer = source.spawn(tx, config.feed.heartbeat_every);
    exchange.attach_feed(producer.abort_handle());

    controller
        .lock()
        .start()
        .context("strategy failed to start")?;

    let mut ticker = Ticker::new(
        rx,
        Watchdog::start(config.feed.watchdog_timeout()),
        config.feed.poll_interval(),
    );
    // Exchange first so fills use the latest mark.
    ticker.subscribe(exchange.clone());
    ticker.subscribe(controller.clone());

    info!("Replay running. Press Ctrl+C to stop.");

    // ── 5. Run until the file is exhausted, the feed dies, or Ctrl+C ─────
    let outcome = tokio::select! {
        result = ticker.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    // ── 6. Shutdown ──────────────────────────────────────────────────────
    ticker.shutdown();
    controller.lock().stop();

    let summary = exchange.summary();
    info!(
        ticks = ticker.ticks(),
        total_pnl = summary.total_pnl,
        net_worth = summary.net_worth,
        open_pnl = exchange.unrealized_pnl(),
        last_price = exchange.current_price(),
        currency = %config.account_currency,
        "Backtest summary"
    );
    info!(
        trades = summary.trades(),
        longs = summary.longs,
        long_win_pct = summary.long_win_pct(),
        shorts = summary.shorts,
        short_win_pct = summary.short_win_pct(),
        "Trade breakdown"
    );

    match outcome {
        Some(Ok(ticks)) => {
            info!(ticks, "Replay complete");
            Ok(())
        }
        None => {
            warn!("Shutdown signal received — stopped early");
            Ok(())
        }
        Some(Err(e @ FeedError::StaleFeed { .. })) => {
            error!(error = %e, "Price feed went stale, shut down");
            Err(e.into())
        }
        Some(Err(e)) => {
            error!(error = %e, "Feed failed");
            Err(e.into())
        }
    }
}
