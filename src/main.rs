//! SpreadNet — Solana quote spread monitor.
//!
//! Entry point. Loads configuration, initialises structured logging, wires
//! the upstream clients into the monitor loop, starts the dashboard and/or
//! console, and shuts everything down cleanly on Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use spreadnet::config::{self, ProviderKind};
use spreadnet::console::{self, ConsoleReporter};
use spreadnet::dashboard;
use spreadnet::engine::monitor::{Monitor, MonitorSettings};
use spreadnet::engine::publisher::Publisher;
use spreadnet::engine::synthesizer::{MultiplierProvider, Synthesizer};
use spreadnet::sources::jupiter::JupiterClient;
use spreadnet::sources::raydium::VenuePriceProvider;
use spreadnet::sources::solana_rpc::SolanaRpcClient;
use spreadnet::sources::{ComparisonPriceProvider, HttpGate, QuoteSource};

const BANNER: &str = r#"
 ____                            _ _   _      _
/ ___| _ __  _ __ ___  __ _  __| | \ | | ___| |_
\___ \| '_ \| '__/ _ \/ _` |/ _` |  \| |/ _ \ __|
 ___) | |_) | | |  __/ (_| | (_| | |\  |  __/ |_
|____/| .__/|_|  \___|\__,_|\__,_|_| \_|\___|\__|
      |_|
  Real-time Solana quote spread monitor
  v0.1.0
"#;

/// Upper bound on waiting for background tasks during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = config::AppConfig::path_from_env();
    let cfg = config::AppConfig::load_or_default(&config_path)?;

    init_logging(&cfg);

    println!("{BANNER}");
    info!(
        config = %config_path,
        pairs = cfg.pairs.0.len(),
        poll_interval_secs = cfg.monitor.poll_interval_secs,
        min_profit_bps = cfg.synthesizer.min_profit_bps,
        provider = ?cfg.synthesizer.provider,
        "SpreadNet starting up"
    );

    // -- Initialise components -------------------------------------------

    // One HTTP client for every upstream; failure here is fatal
    let gate = HttpGate::new(&cfg.upstream).context("Failed to construct HTTP client")?;

    let quotes: Arc<dyn QuoteSource> = Arc::new(JupiterClient::new(
        gate.clone(),
        &cfg.upstream.quote_api_url,
        cfg.upstream.slippage_bps,
    ));
    let chain = Arc::new(SolanaRpcClient::new(gate.clone(), &cfg.upstream.rpc_url));

    let comparisons: Arc<dyn ComparisonPriceProvider> = match cfg.synthesizer.provider {
        ProviderKind::Multiplier => Arc::new(MultiplierProvider::from_config(&cfg.synthesizer)),
        ProviderKind::Venue => Arc::new(VenuePriceProvider::new(
            gate.clone(),
            &cfg.upstream.venue_price_url,
        )),
    };
    info!(
        quotes = quotes.name(),
        comparisons = comparisons.name(),
        min_profit_bps = cfg.synthesizer.min_profit_bps,
        fee_bps = cfg.synthesizer.fee_bps,
        "Upstreams configured"
    );

    let publisher = Arc::new(Publisher::new(cfg.dashboard.event_buffer));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // -- Presentation ----------------------------------------------------

    let dashboard_task = if cfg.dashboard.enabled {
        let (_, task) =
            dashboard::start_dashboard(publisher.clone(), cfg.dashboard.port, shutdown_tx.subscribe())
                .await?;
        Some(task)
    } else {
        None
    };

    let console_task = if cfg.console.enabled {
        let (_, events) = publisher.subscribe().await;
        Some(ConsoleReporter::new(cfg.console.summary_every).spawn(events, shutdown_tx.subscribe()))
    } else {
        None
    };

    if dashboard_task.is_none() && console_task.is_none() {
        warn!("Dashboard and console both disabled, results are only logged");
    }

    // -- Main loop -------------------------------------------------------

    let monitor = Monitor::new(
        MonitorSettings::from_config(&cfg),
        quotes,
        chain,
        comparisons,
        Synthesizer::from_config(&cfg.synthesizer),
        publisher.clone(),
    );
    let handle = monitor.spawn();
    info!(state = ?handle.state(), "Monitoring started. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received.");

    // Let the in-flight cycle finish before tearing down readers
    handle.stop().await?;
    let _ = shutdown_tx.send(());

    for task in [dashboard_task, console_task].into_iter().flatten() {
        if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
            warn!("Background task did not stop in time");
        }
    }

    let snapshot = publisher.snapshot().await;
    println!("\n{}", console::format_session_summary(&snapshot.stats));

    drop(gate);
    info!(
        cycles = snapshot.cycle,
        opportunities = snapshot.stats.total_opportunities,
        "SpreadNet shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &config::AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("spreadnet=info"));

    let json_logging = std::env::var("SPREADNET_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(!cfg.console.enabled)
            .init();
    }
}
