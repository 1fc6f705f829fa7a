//! Monitor: the owned poll → synthesize → aggregate → publish loop.
//!
//! The monitor task is the only writer of monitor state. Each cycle runs to
//! completion before the loop sleeps, so cycles never overlap, and nothing
//! becomes visible to readers until [`Publisher::publish`] swaps in the
//! finished snapshot.

use anyhow::{Context, Result};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::aggregator::RollingAggregator;
use super::publisher::{Publisher, Snapshot};
use super::synthesizer::Synthesizer;
use crate::config::AppConfig;
use crate::sources::{ChainProbe, ComparisonPriceProvider, QuoteSource};
use crate::types::{ConnectionStatus, Opportunity, SystemStats, TradingPair};

/// Loop lifecycle. `Stopped → Running` on spawn, `Running → Stopped` on stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// Knobs the loop needs, lifted out of [`AppConfig`].
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub pairs: Vec<TradingPair>,
    pub notional_amount: u64,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub window_size: usize,
    /// Whether the push channel is being served.
    pub push_enabled: bool,
}

impl MonitorSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            pairs: cfg.pairs.0.clone(),
            notional_amount: cfg.monitor.notional_amount,
            poll_interval: cfg.monitor.poll_interval(),
            error_backoff: cfg.monitor.error_backoff(),
            window_size: cfg.history.window_size,
            push_enabled: cfg.dashboard.enabled,
        }
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub pairs_quoted: usize,
    pub pairs_skipped: usize,
    pub opportunities: Vec<Opportunity>,
    pub status: ConnectionStatus,
    pub stats: SystemStats,
    pub subscribers_reached: usize,
}

pub struct Monitor {
    settings: MonitorSettings,
    quotes: Arc<dyn QuoteSource>,
    chain: Arc<dyn ChainProbe>,
    comparisons: Arc<dyn ComparisonPriceProvider>,
    synthesizer: Synthesizer,
    aggregator: RollingAggregator,
    publisher: Arc<Publisher>,
    last_slot: u64,
    cycle: u64,
}

impl Monitor {
    pub fn new(
        settings: MonitorSettings,
        quotes: Arc<dyn QuoteSource>,
        chain: Arc<dyn ChainProbe>,
        comparisons: Arc<dyn ComparisonPriceProvider>,
        synthesizer: Synthesizer,
        publisher: Arc<Publisher>,
    ) -> Self {
        let aggregator = RollingAggregator::new(settings.window_size, Utc::now());
        Self {
            settings,
            quotes,
            chain,
            comparisons,
            synthesizer,
            aggregator,
            publisher,
            last_slot: 0,
            cycle: 0,
        }
    }

    pub fn publisher(&self) -> Arc<Publisher> {
        self.publisher.clone()
    }

    /// Run one full cycle and publish its snapshot.
    ///
    /// Transient upstream failures skip the affected pair. Any other error
    /// aborts the cycle before anything is recorded or published.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let cycle = self.cycle + 1;
        let started = Utc::now();
        debug!(cycle, "Starting cycle");

        // 1. Chain probe
        let (health, slot) = tokio::join!(self.chain.health(), self.chain.slot());
        let rpc_health = health.unwrap_or_else(|e| {
            warn!(error = %e, "RPC health check failed");
            false
        });
        match slot {
            Ok(slot) => self.last_slot = slot,
            Err(e) => warn!(error = %e, last_slot = self.last_slot, "Slot probe failed, keeping last slot"),
        }

        // 2. Quotes and synthesis, in pair order
        let mut fresh = Vec::new();
        let mut pairs_quoted = 0;
        let mut pairs_skipped = 0;

        for pair in &self.settings.pairs {
            let quote = match self.quotes.fetch_quote(pair, self.settings.notional_amount).await {
                Ok(q) => q,
                Err(e) if e.is_transient() => {
                    warn!(pair = %pair, error = %e, "No quote this cycle");
                    pairs_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e).with_context(|| format!("Quote for {pair}")),
            };
            pairs_quoted += 1;
            debug!(quote = %quote, ui_price = ?quote.ui_price(), "Quote received");

            let prices = match self.comparisons.comparison_prices(pair, &quote).await {
                Ok(p) => p,
                Err(e) if e.is_transient() => {
                    warn!(pair = %pair, error = %e, "No comparison prices this cycle");
                    continue;
                }
                Err(e) => return Err(e).with_context(|| format!("Comparison prices for {pair}")),
            };

            let found = self
                .synthesizer
                .synthesize(&quote, &prices, started)
                .with_context(|| format!("Synthesizing {pair}"))?;
            fresh.extend(found);
        }

        // 3. Aggregate
        self.aggregator.record(fresh.clone(), started);
        let now = Utc::now();
        let stats = self.aggregator.stats(now);

        let status = ConnectionStatus {
            rpc_health,
            quote_api: pairs_quoted > 0,
            websocket: self.settings.push_enabled,
            subscribers: self.publisher.subscriber_count(),
            last_slot: self.last_slot,
            last_update: Some(now),
        };

        // 4. Publish
        self.cycle = cycle;
        let snapshot = Snapshot {
            cycle,
            opportunities: self.aggregator.history(),
            status: status.clone(),
            stats: stats.clone(),
        };
        let subscribers_reached = self.publisher.publish(snapshot, &fresh).await;

        Ok(CycleReport {
            cycle,
            pairs_quoted,
            pairs_skipped,
            opportunities: fresh,
            status,
            stats,
            subscribers_reached,
        })
    }

    /// Move the monitor onto its own task and start looping.
    pub fn spawn(mut self) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let (state_tx, state_rx) = watch::channel(LoopState::Stopped);
        state_tx.send_replace(LoopState::Running);

        let poll_interval = self.settings.poll_interval;
        let error_backoff = self.settings.error_backoff;

        let task = tokio::spawn(async move {
            info!(
                pairs = self.settings.pairs.len(),
                interval_secs = poll_interval.as_secs_f64(),
                "Monitor loop running"
            );

            loop {
                let outcome = AssertUnwindSafe(self.run_cycle()).catch_unwind().await;
                let delay = match outcome {
                    Ok(Ok(report)) => {
                        log_cycle_report(&report);
                        poll_interval
                    }
                    Ok(Err(e)) => {
                        error!(error = format!("{e:#}"), "Cycle failed, backing off");
                        error_backoff
                    }
                    Err(panic) => {
                        error!(panic = %panic_message(panic.as_ref()), "Cycle panicked, backing off");
                        error_backoff
                    }
                };

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.recv() => break,
                }
            }

            state_tx.send_replace(LoopState::Stopped);
            info!(cycles = self.cycle, "Monitor loop stopped");
        });

        MonitorHandle {
            shutdown: shutdown_tx,
            state: state_rx,
            task,
        }
    }
}

/// Control handle for a spawned monitor.
pub struct MonitorHandle {
    shutdown: broadcast::Sender<()>,
    state: watch::Receiver<LoopState>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Signal the loop and wait for it to exit. A cycle already in flight
    /// runs to completion first.
    pub async fn stop(self) -> Result<()> {
        // Err means the loop already exited
        let _ = self.shutdown.send(());
        self.task.await.context("Monitor task failed")?;
        Ok(())
    }
}

fn log_cycle_report(report: &CycleReport) {
    info!(
        cycle = report.cycle,
        quoted = report.pairs_quoted,
        skipped = report.pairs_skipped,
        opportunities = report.opportunities.len(),
        total = report.stats.total_opportunities,
        rpc = report.status.rpc_health,
        slot = report.status.last_slot,
        subscribers = report.subscribers_reached,
        "Cycle complete"
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
