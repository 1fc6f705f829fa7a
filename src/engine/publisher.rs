//! Publisher: the single holder of monitor state, with two read paths.
//!
//! Pull: handlers call [`Publisher::snapshot`] and get an immutable
//! `Arc<Snapshot>`. Push: subscribers receive [`MonitorEvent`]s over a
//! broadcast channel.
//!
//! The monitor replaces the whole snapshot at the end of each cycle and
//! sends that cycle's events while still holding the write lock. A
//! subscriber registers under the read lock, so it either sees the old
//! snapshot and then every event of the next cycle, or the new snapshot and
//! none of that cycle's events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::types::{ConnectionStatus, Opportunity, SystemStats};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything readers can see, replaced atomically once per cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// Completed cycles (0 before the first one finishes).
    pub cycle: u64,
    /// History window, oldest first. May contain expired entries.
    pub opportunities: Vec<Opportunity>,
    pub status: ConnectionStatus,
    pub stats: SystemStats,
}

impl Snapshot {
    /// Opportunities still valid at `now`.
    pub fn active_opportunities(&self, now: DateTime<Utc>) -> Vec<Opportunity> {
        self.opportunities
            .iter()
            .filter(|o| o.is_valid(now))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Messages on the push channel: `{ "type": ..., "data": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// One per opportunity created this cycle.
    NewOpportunity(Opportunity),
    ConnectionStatus(ConnectionStatus),
    SystemStats(SystemStats),
    /// Sent once on connect: every opportunity that has not expired.
    OpportunitiesUpdate(Vec<Opportunity>),
}

/// Messages a newly connected subscriber receives before any cycle event.
pub fn handshake_events(snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<MonitorEvent> {
    vec![
        MonitorEvent::ConnectionStatus(snapshot.status.clone()),
        MonitorEvent::SystemStats(snapshot.stats.clone()),
        MonitorEvent::OpportunitiesUpdate(snapshot.active_opportunities(now)),
    ]
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

pub struct Publisher {
    current: RwLock<Arc<Snapshot>>,
    events: broadcast::Sender<MonitorEvent>,
}

impl Publisher {
    pub fn new(buffer: usize) -> Self {
        Self::with_snapshot(buffer, Snapshot::default())
    }

    pub fn with_snapshot(buffer: usize, initial: Snapshot) -> Self {
        let (events, _) = broadcast::channel(buffer);
        Self {
            current: RwLock::new(Arc::new(initial)),
            events,
        }
    }

    /// Latest complete snapshot.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    /// Swap in `snapshot` and push this cycle's events. Returns the number of
    /// subscribers the events reached.
    pub async fn publish(&self, snapshot: Snapshot, fresh: &[Opportunity]) -> usize {
        let status = snapshot.status.clone();
        let stats = snapshot.stats.clone();

        let mut current = self.current.write().await;
        *current = Arc::new(snapshot);

        for opp in fresh {
            // Err only means nobody is listening
            let _ = self.events.send(MonitorEvent::NewOpportunity(opp.clone()));
        }
        let _ = self.events.send(MonitorEvent::ConnectionStatus(status));
        let reached = self.events.send(MonitorEvent::SystemStats(stats)).unwrap_or(0);
        drop(current);

        debug!(fresh = fresh.len(), subscribers = reached, "Cycle published");
        reached
    }

    /// Register a subscriber, returning the snapshot it should start from.
    pub async fn subscribe(&self) -> (Arc<Snapshot>, broadcast::Receiver<MonitorEvent>) {
        let current = self.current.read().await;
        let rx = self.events.subscribe();
        (current.clone(), rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
