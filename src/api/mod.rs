//! HTTP + WebSocket surface for the fleet.

mod ws;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::error::FleetError;
use crate::worker::Orchestrator;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<Orchestrator>,
}

/// Build the Axum router with fleet WebSocket and REST routes.
pub fn fleet_routes(fleet: Arc<Orchestrator>) -> Router {
    let state = AppState { fleet };

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health))
        .route("/api/fleet", get(get_fleet))
        .route("/api/logs", get(global_logs))
        .route("/api/artifacts", get(list_artifacts))
        .route("/api/workers/{id}", get(get_worker))
        .route("/api/workers/{id}/logs", get(worker_logs))
        .route("/api/directive", post(submit_directive))
        .route("/api/kill", post(kill_fleet))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(serde_json::json!({"error": message.into()})),
    )
        .into_response()
}

fn parse_worker_id(id: &str) -> Result<Uuid, axum::response::Response> {
    Uuid::parse_str(id).map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid worker ID"))
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ai-fleet"
    }))
}

// ── Queries ─────────────────────────────────────────────────────────────

async fn get_fleet(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.fleet.snapshot().await;
    let counts = state.fleet.counts().await;
    let broadcast = state.fleet.current_broadcast().await;
    Json(serde_json::json!({
        "workers": snapshot.workers,
        "counts": counts,
        "broadcast": broadcast,
        "orchestrating": state.fleet.is_orchestrating(),
    }))
}

async fn global_logs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.fleet.global_logs().await)
}

async fn list_artifacts(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.fleet.artifacts().await)
}

async fn get_worker(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let worker_id = match parse_worker_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.fleet.worker(worker_id).await {
        Some(worker) => (StatusCode::OK, Json(serde_json::json!(worker))).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Worker not found"),
    }
}

async fn worker_logs(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let worker_id = match parse_worker_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    if state.fleet.worker(worker_id).await.is_none() {
        return error_response(StatusCode::NOT_FOUND, "Worker not found");
    }
    Json(state.fleet.worker_logs(worker_id).await).into_response()
}

// ── Commands ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DirectiveRequest {
    directive: String,
}

async fn submit_directive(
    State(state): State<AppState>,
    Json(body): Json<DirectiveRequest>,
) -> impl IntoResponse {
    match state.fleet.submit_directive(&body.directive).await {
        Ok(outcome) => {
            info!(workers = outcome.spawned.len(), "Directive accepted via REST");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "spawned": outcome.spawned,
                    "fallback": outcome.fallback,
                })),
            )
                .into_response()
        }
        Err(e @ FleetError::Busy) => error_response(StatusCode::CONFLICT, e.to_string()),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn kill_fleet(State(state): State<AppState>) -> impl IntoResponse {
    let killed = state.fleet.kill_all().await;
    info!(killed, "Fleet killed via REST");
    Json(serde_json::json!({"killed": killed}))
}
