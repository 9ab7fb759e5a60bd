use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ai_fleet::api::fleet_routes;
use ai_fleet::config::{FleetConfig, ServerConfig};
use ai_fleet::llm::{AnthropicClient, LlmConfig};
use ai_fleet::store::{LibSqlSnapshotStore, SnapshotStore};
use ai_fleet::worker::{Orchestrator, OrchestratorDeps, spawn_recovery_loop, spawn_scheduler};

/// Wire the LLM client and snapshot database into a fleet.
async fn build_fleet(server: &ServerConfig) -> ai_fleet::error::Result<Arc<Orchestrator>> {
    let llm_config = LlmConfig::from_env()?;
    let llm = Arc::new(AnthropicClient::new(&llm_config)?);
    eprintln!("   Model: {}", llm.model_name());

    let snapshots: Arc<dyn SnapshotStore> =
        Arc::new(LibSqlSnapshotStore::new_local(&server.db_path).await?);
    eprintln!("   Database: {}", server.db_path.display());

    Ok(Orchestrator::new(
        FleetConfig::from_env(),
        OrchestratorDeps {
            planner: llm.clone(),
            stepper: llm,
            snapshots: Some(snapshots),
        },
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let server = ServerConfig::from_env();

    // Initialize tracing (stderr, plus a daily rolling file if configured)
    let (file_layer, _log_guard) = match &server.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ai-fleet.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("🛰  AI Fleet v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Fleet WS: ws://0.0.0.0:{}/ws", server.port);
    eprintln!("   Fleet API: http://0.0.0.0:{}/api/fleet", server.port);

    let fleet = build_fleet(&server)
        .await
        .context("Failed to start the fleet")?;

    if fleet.restore().await {
        let counts = fleet.counts().await;
        eprintln!(
            "   Restored {} worker(s) ({} completed, {} awaiting recovery)",
            counts.total, counts.completed, counts.awaiting_recovery
        );
    }

    let _scheduler = spawn_scheduler(Arc::clone(&fleet));
    let _recovery = spawn_recovery_loop(Arc::clone(&fleet));

    // ── HTTP / WS ────────────────────────────────────────────────────────
    let app = fleet_routes(Arc::clone(&fleet));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server.port))
        .await
        .with_context(|| format!("Failed to bind port {}", server.port))?;
    tracing::info!(port = server.port, "Fleet server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
