//! Orchestrator: the shared handle every fleet component works through.
//!
//! Owns the fleet store, the stepper sessions and the two gates:
//! - the **turn gate** admits one worker turn at a time and remembers when
//!   the last turn ended (for the cool-down)
//! - the **orchestration gate** admits one planning call at a time, shared by
//!   directive intake and the recovery manager
//!
//! Snapshot writes go through a third lock, the persistence gate, held from
//! reading the store until the save or clear returns. Saves therefore land in
//! order, and a clear issued by kill or intake runs after any save already
//! underway.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Mutex, RwLock, broadcast};
use uuid::Uuid;

use crate::config::FleetConfig;
use crate::llm::{Planner, Stepper};
use crate::store::{FleetSnapshot, SnapshotStore};
use crate::worker::artifacts::Artifact;
use crate::worker::events::{BroadcastEvent, FleetEvent};
use crate::worker::fleet::{FleetStore, StatusCounts};
use crate::worker::log::{LogEntry, LogKind};
use crate::worker::memory::SessionRegistry;
use crate::worker::state::Worker;

/// Event channel capacity.
const EVENT_CAPACITY: usize = 256;

/// External collaborators.
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub planner: Arc<dyn Planner>,
    pub stepper: Arc<dyn Stepper>,
    /// Snapshot persistence (None = in-memory only).
    pub snapshots: Option<Arc<dyn SnapshotStore>>,
}

/// Turn gate state.
#[derive(Debug, Default)]
pub(crate) struct TurnGate {
    last_finished: Option<Instant>,
}

impl TurnGate {
    /// Time left before another turn may start.
    pub(crate) fn cooldown_remaining(&self, cooldown: Duration) -> Option<Duration> {
        let elapsed = self.last_finished?.elapsed();
        cooldown.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    pub(crate) fn finish(&mut self) {
        self.last_finished = Some(Instant::now());
    }
}

/// Shared fleet handle.
pub struct Orchestrator {
    pub(crate) config: FleetConfig,
    pub(crate) store: RwLock<FleetStore>,
    pub(crate) sessions: SessionRegistry,
    pub(crate) deps: OrchestratorDeps,
    pub(crate) turn_gate: Mutex<TurnGate>,
    pub(crate) orchestration: Mutex<()>,
    persistence: Mutex<()>,
    events: broadcast::Sender<FleetEvent>,
}

impl Orchestrator {
    pub fn new(config: FleetConfig, deps: OrchestratorDeps) -> Arc<Self> {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            config,
            store: RwLock::new(FleetStore::new()),
            sessions: SessionRegistry::new(),
            deps,
            turn_gate: Mutex::new(TurnGate::default()),
            orchestration: Mutex::new(()),
            persistence: Mutex::new(()),
            events,
        })
    }

    /// Load the persisted snapshot, if any. Returns true if state was restored.
    pub async fn restore(&self) -> bool {
        let Some(snapshots) = self.deps.snapshots.as_ref() else {
            return false;
        };

        match snapshots.load().await {
            Ok(Some(snapshot)) if !snapshot.is_empty() => {
                let workers = snapshot.workers.len();
                *self.store.write().await = FleetStore::from_snapshot(snapshot);
                self.sessions.clear().await;
                tracing::info!(workers, "Fleet restored from snapshot");
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load fleet snapshot, starting empty");
                false
            }
        }
    }

    /// Subscribe to live fleet events.
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.events.subscribe()
    }

    /// Send an event. Fine if nobody is listening.
    pub(crate) fn emit(&self, event: FleetEvent) {
        let _ = self.events.send(event);
    }

    /// Append a log entry and fan it out.
    pub(crate) fn log_locked(
        &self,
        store: &mut FleetStore,
        kind: LogKind,
        message: impl Into<String>,
        worker_id: Option<Uuid>,
    ) -> LogEntry {
        let entry = store.log(kind, message, worker_id);
        self.emit(FleetEvent::Log {
            entry: entry.clone(),
        });
        entry
    }

    /// Save the current state. Failures are logged, never propagated.
    ///
    /// A killed fleet is never saved: its snapshot stays cleared until the
    /// next directive.
    pub(crate) async fn persist(&self) {
        let Some(snapshots) = self.deps.snapshots.as_ref() else {
            return;
        };
        let _persisting = self.persistence.lock().await;
        let snapshot = {
            let store = self.store.read().await;
            if store.is_killed() {
                tracing::debug!("Fleet killed, snapshot not saved");
                return;
            }
            store.snapshot()
        };
        if let Err(e) = snapshots.save(&snapshot).await {
            tracing::warn!(error = %e, "Failed to persist fleet snapshot");
        }
    }

    /// Drop the persisted snapshot once any save underway has landed.
    /// Failures are logged, never propagated.
    pub(crate) async fn clear_persisted(&self) {
        let Some(snapshots) = self.deps.snapshots.as_ref() else {
            return;
        };
        let _persisting = self.persistence.lock().await;
        if let Err(e) = snapshots.clear().await {
            tracing::warn!(error = %e, "Failed to clear fleet snapshot");
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> FleetSnapshot {
        self.store.read().await.snapshot()
    }

    pub async fn counts(&self) -> StatusCounts {
        self.store.read().await.counts()
    }

    pub async fn workers(&self) -> Vec<Worker> {
        self.store.read().await.workers().to_vec()
    }

    pub async fn worker(&self, id: Uuid) -> Option<Worker> {
        self.store.read().await.get(id).cloned()
    }

    pub async fn worker_by_name(&self, name: &str) -> Option<Worker> {
        self.store.read().await.by_name(name).cloned()
    }

    /// Full history for one worker.
    pub async fn worker_logs(&self, id: Uuid) -> Vec<LogEntry> {
        self.store.read().await.logs().for_worker(id).to_vec()
    }

    pub async fn global_logs(&self) -> Vec<LogEntry> {
        self.store.read().await.logs().global_snapshot()
    }

    pub async fn artifacts(&self) -> Vec<Artifact> {
        self.store.read().await.artifacts().all().to_vec()
    }

    pub async fn artifact(&self, path: &str) -> Option<Artifact> {
        self.store.read().await.artifacts().get(path).cloned()
    }

    /// The live broadcast, if it has not expired.
    pub async fn current_broadcast(&self) -> Option<BroadcastEvent> {
        self.store
            .read()
            .await
            .current_broadcast(Utc::now())
            .cloned()
    }

    /// Whether a planning call (intake or recovery) is outstanding.
    pub fn is_orchestrating(&self) -> bool {
        self.orchestration.try_lock().is_err()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }

    // ── Kill ────────────────────────────────────────────────────────

    /// Kill every live worker immediately.
    ///
    /// Does not wait for an in-flight turn. Its result is discarded at
    /// write-back because the worker is no longer `Thinking`.
    pub async fn kill_all(&self) -> usize {
        let (killed, in_flight) = {
            let mut store = self.store.write().await;
            let in_flight = store.in_turn().len();
            let ids = store.kill_all();
            for id in &ids {
                if let Some(worker) = store.get(*id) {
                    self.emit(FleetEvent::WorkerUpdated {
                        worker: worker.clone(),
                    });
                }
            }
            self.log_locked(
                &mut store,
                LogKind::Error,
                format!("Fleet killed: {} worker(s) terminated", ids.len()),
                None,
            );
            (ids.len(), in_flight)
        };

        let sessions = self.sessions.clear().await;
        self.clear_persisted().await;
        self.emit(FleetEvent::FleetKilled { killed });

        tracing::info!(killed, in_flight, sessions, "Fleet killed");
        killed
    }
}
