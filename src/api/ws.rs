//! WebSocket stream of fleet events, plus directive/kill commands from clients.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::AppState;
use crate::worker::{FleetEvent, Orchestrator};

/// Commands a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientAction {
    Directive { text: String },
    Kill,
}

pub(super) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!("WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.fleet))
}

async fn sync_event(fleet: &Orchestrator) -> FleetEvent {
    FleetEvent::FleetSync {
        snapshot: fleet.snapshot().await,
        counts: fleet.counts().await,
    }
}

async fn send_event(socket: &mut WebSocket, event: &FleetEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize fleet event");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, fleet: Arc<Orchestrator>) {
    info!("WebSocket client connected");

    // Subscribe before the initial sync so nothing slips between them
    let mut rx = fleet.subscribe();

    if !send_event(&mut socket, &sync_event(&fleet).await).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind fleet events");
                        if !send_event(&mut socket, &sync_event(&fleet).await).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Fleet event channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, &fleet);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

/// Commands run detached so a slow planner never stalls the event stream.
fn handle_client_message(text: &str, fleet: &Arc<Orchestrator>) {
    match serde_json::from_str::<ClientAction>(text) {
        Ok(ClientAction::Directive { text }) => {
            let fleet = Arc::clone(fleet);
            tokio::spawn(async move {
                match fleet.submit_directive(&text).await {
                    Ok(outcome) => {
                        info!(workers = outcome.spawned.len(), "Directive accepted via WS")
                    }
                    Err(e) => warn!(error = %e, "Directive rejected via WS"),
                }
            });
        }
        Ok(ClientAction::Kill) => {
            let fleet = Arc::clone(fleet);
            tokio::spawn(async move {
                let killed = fleet.kill_all().await;
                info!(killed, "Fleet killed via WS");
            });
        }
        Err(e) => {
            debug!(error = %e, text = text, "Unrecognized WS message from client");
        }
    }
}
