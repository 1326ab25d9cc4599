//! Poolwatch - pool trade alert bot, headless server.
//!
//! Wires the rate-limited feed client, the poll/broadcast engine, the
//! Telegram delivery sink and the SQLite subscriber registry, then drives
//! the independent timer loops.

mod config;
mod health;

use clap::Parser;
use config::AppConfig;
use poolwatch_alerts::{SqliteRegistry, TelegramAlerter};
use poolwatch_engine::{
    AlertSink, Broadcaster, ContestSweeper, PollEngine, SubscriberRegistry, TickOutcome,
    WatchlistAggregator,
};
use poolwatch_feeds::{FeedClient, MarketApi};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Poolwatch CLI
#[derive(Parser, Debug)]
#[command(name = "poolwatch-bot")]
#[command(about = "Liquidity pool trade alert bot", long_about = None)]
struct Args {
    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Liveness endpoint port (overrides HEALTH_PORT)
    #[arg(long)]
    health_port: Option<u16>,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut app_config = AppConfig::from_env()?;
    if let Some(port) = args.health_port {
        app_config.health_port = port;
    }
    app_config.validate()?;

    info!("Starting poolwatch");

    let client = Arc::new(FeedClient::new(app_config.feed.client_config())?);
    let api = Arc::new(MarketApi::new(
        Arc::clone(&client),
        app_config.feed.api_config(),
    )?);

    let registry: Arc<dyn SubscriberRegistry> =
        Arc::new(SqliteRegistry::connect(&app_config.database_url).await?);
    let sink: Arc<dyn AlertSink> = Arc::new(TelegramAlerter::new(&app_config.telegram_token));

    let broadcaster = Broadcaster::new(
        Arc::clone(&registry),
        Arc::clone(&sink),
        Arc::clone(&api),
        app_config.broadcast.broadcaster_config(),
    );
    let engine = Arc::new(PollEngine::new(
        Arc::clone(&api),
        broadcaster,
        app_config.engine_config(),
    ));
    let aggregator = WatchlistAggregator::new(Arc::clone(&registry));
    let sweeper = ContestSweeper::new(Arc::clone(&registry), Arc::clone(&sink));

    // Seed the polling set so the first tick has work.
    aggregator.refresh(engine.scheduler()).await;

    let mut handles = Vec::new();

    // Watchlist refresh loop
    {
        let engine = Arc::clone(&engine);
        let period = Duration::from_secs(app_config.intervals.refresh_secs);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                aggregator.refresh(engine.scheduler()).await;
            }
        }));
    }

    // Poll tick loop
    {
        let engine = Arc::clone(&engine);
        let period = Duration::from_millis(app_config.intervals.poll_ms);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match engine.tick().await {
                    TickOutcome::Broadcast { pool, delivered } => {
                        info!(%pool, delivered, "alert broadcast")
                    }
                    TickOutcome::FeedGone(pool) => warn!(%pool, "feed retired"),
                    outcome => debug!(?outcome, "tick complete"),
                }
            }
        }));
    }

    // Contest sweep loop
    {
        let period = Duration::from_secs(app_config.intervals.contest_sweep_secs);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let closed = sweeper.sweep().await;
                if closed > 0 {
                    info!(closed, "contests closed");
                }
            }
        }));
    }

    // Dedup and cache eviction loop
    {
        let engine = Arc::clone(&engine);
        let client = Arc::clone(&client);
        let period = Duration::from_secs(app_config.intervals.evict_secs);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let dedup_evicted = engine.dedup().evict_expired();
                let cache_evicted = client.evict_stale_cache();
                debug!(dedup_evicted, cache_evicted, "eviction sweep complete");
            }
        }));
    }

    // Liveness endpoint
    {
        let port = app_config.health_port;
        handles.push(tokio::spawn(async move {
            if let Err(e) = health::serve(port).await {
                warn!(error = %e, "liveness endpoint stopped");
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
