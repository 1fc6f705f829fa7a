//! Dashboard API route handlers.
//!
//! All endpoints return JSON built from one [`Snapshot`] read, so a single
//! response never mixes two cycles.
//!
//! [`Snapshot`]: crate::engine::publisher::Snapshot

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::engine::publisher::Publisher;
use crate::types::{ConnectionStatus, Opportunity, SystemStats};

pub type AppState = Arc<Publisher>;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/opportunities
pub async fn get_opportunities(State(state): State<AppState>) -> Json<Vec<Opportunity>> {
    let snapshot = state.snapshot().await;
    Json(snapshot.active_opportunities(Utc::now()))
}

/// GET /api/connection-status
pub async fn get_connection_status(State(state): State<AppState>) -> Json<ConnectionStatus> {
    Json(state.snapshot().await.status.clone())
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<SystemStats> {
    Json(state.snapshot().await.stats.clone())
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cycle: state.snapshot().await.cycle,
        timestamp: Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
