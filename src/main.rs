//! RIT Commodity Trader - Main Entry Point
//!
//! `run` drives the refining, news, transport and storage engines against
//! the simulator; `market-make` runs the standalone quoting session.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rit_commodity_trader::config::Config;
use rit_commodity_trader::exchange::RitClient;
use rit_commodity_trader::orchestrator::Orchestrator;
use rit_commodity_trader::strategy::MarketMaker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// RIT Commodity Trader CLI
#[derive(Parser)]
#[command(name = "rit-commodity-trader")]
#[command(version, about = "Algorithmic strategies for the RIT commodities simulator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the refining, news, transport and storage engines (default)
    Run,

    /// Run the two-sided market-making session
    MarketMake {
        /// Override the quoted ticker
        #[arg(short, long)]
        ticker: Option<String>,

        /// Override the tick at which quoting stops
        #[arg(short, long)]
        end_tick: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║          RIT Commodity Trader v{}                       ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let mut config = Config::load()?;
    config.validate().context("Invalid configuration")?;

    if config.api.api_key.is_empty() {
        warn!("⚠️  No API key configured (RIT__API__API_KEY). Requests will be rejected.");
    }

    let client = RitClient::new(&config.api)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    match cli.command {
        Some(Commands::MarketMake { ticker, end_tick }) => {
            if let Some(ticker) = ticker {
                config.market_making.ticker = ticker;
            }
            if let Some(end_tick) = end_tick {
                config.market_making.end_tick = end_tick;
            }
            log_market_making_config(&config);

            let market_maker = MarketMaker::new(config.market_making.clone());
            let summary = market_maker
                .run(&client, &shutdown)
                .await
                .context("Market making session aborted")?;

            info!(
                cycles = summary.cycles,
                errors = summary.errors,
                final_tick = summary.final_tick,
                final_nlv = ?summary.final_nlv,
                completed = summary.completed,
                "👋 Market making finished"
            );
        }
        Some(Commands::Run) | None => {
            log_config(&config);

            let mut orchestrator = Orchestrator::new(&config);
            info!("🚀 Starting control loop...");
            let stats = orchestrator
                .run(&client, &shutdown)
                .await
                .context("Could not reach the simulator")?;

            info!(
                cycles = stats.cycles,
                actions = stats.actions,
                errors = stats.errors,
                "👋 Trader shutdown complete"
            );
        }
    }

    Ok(())
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "rit-trader.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer alive for the whole process
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rit_commodity_trader=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Simulator: {}", config.api.base_url);
    info!("   Cycle Interval: {}ms", config.runtime.cycle_interval_ms);
    info!("   Max Arrival Wait: {}ms", config.runtime.max_wait_ms);
    info!(
        "   News: {} limit {} hold {} ticks",
        config.fundamental.ticker, config.fundamental.position_limit, config.fundamental.hold_ticks
    );
    info!(
        "   Refining: batch {} fee ${} min profit ${}",
        config.refining.batch_size, config.refining.refining_fee, config.refining.min_profit
    );
    for route in &config.transport.routes {
        info!(
            "   Route {}: {} -> {} via {} (default lease ${})",
            route.name,
            route.origin_ticker,
            route.destination_ticker,
            route.pipeline,
            route.default_lease_cost
        );
    }
    info!("   Storage Round: {}", config.storage.round);
}

fn log_market_making_config(config: &Config) {
    let mm = &config.market_making;
    info!("📋 Market Making:");
    info!("   Ticker: {}", mm.ticker);
    info!("   Ticks: [{}, {})", mm.start_tick, mm.end_tick);
    info!(
        "   Size: {} (reduced {} beyond ±{})",
        mm.order_size, mm.rebalance_size, mm.rebalance_limit
    );
    info!("   Max Open Orders: {}", mm.max_open_orders);
}
