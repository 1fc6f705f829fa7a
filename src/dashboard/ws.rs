//! WebSocket push channel.
//!
//! Clients connect to `/ws`. On connect they receive `connection_status`,
//! `system_stats` and `opportunities_update` built from the current
//! snapshot, then every event the monitor publishes afterwards:
//! - `{ "type": "new_opportunity", "data": { ... } }`
//! - `{ "type": "connection_status", "data": { ... } }`
//! - `{ "type": "system_stats", "data": { ... } }`

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::routes::AppState;
use crate::engine::publisher::{handshake_events, MonitorEvent};

/// WebSocket upgrade handler at GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Serialize and send one event. `false` once the client is gone.
async fn send_event(socket: &mut WebSocket, event: &MonitorEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize event");
            true
        }
    }
}

async fn handle_ws(mut socket: WebSocket, state: AppState) {
    let client = Uuid::new_v4();
    let (snapshot, mut rx) = state.subscribe().await;
    info!(%client, subscribers = state.subscriber_count(), "WebSocket client connected");

    for event in handshake_events(&snapshot, Utc::now()) {
        if !send_event(&mut socket, &event).await {
            info!(%client, "WebSocket client left during handshake");
            return;
        }
    }
    drop(snapshot);

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(evt) => {
                        if !send_event(&mut socket, &evt).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(%client, skipped = n, "WebSocket client lagged, skipped events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(%client, error = %e, "WebSocket receive error");
                        break;
                    }
                    // Client text/binary frames carry nothing we act on
                    _ => {}
                }
            }
        }
    }

    info!(%client, "WebSocket client disconnected");
}
