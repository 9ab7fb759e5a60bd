//! Fleet store: workers, logs, artifacts and the broadcast slot.
//!
//! Pure data. All locking happens one level up in the orchestrator.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FleetError;
use crate::llm::{DependencyStatus, TaskSpec};
use crate::store::FleetSnapshot;
use crate::worker::artifacts::ArtifactRegistry;
use crate::worker::events::BroadcastEvent;
use crate::worker::log::{LogBook, LogEntry, LogKind};
use crate::worker::state::{MAX_RECOVERY_ATTEMPTS, Worker, WorkerStatus};

/// Outcome of an upsert-by-name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spawned {
    Created(Uuid),
    Updated(Uuid),
}

impl Spawned {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Created(id) | Self::Updated(id) => *id,
        }
    }
}

/// Per-status worker counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub idle: usize,
    pub working: usize,
    pub thinking: usize,
    pub completed: usize,
    pub awaiting_recovery: usize,
    pub error: usize,
    pub killed: usize,
}

/// In-memory entity store for one fleet.
#[derive(Debug, Default)]
pub struct FleetStore {
    workers: Vec<Worker>,
    names: HashMap<String, Uuid>,
    logs: LogBook,
    artifacts: ArtifactRegistry,
    broadcast: Option<BroadcastEvent>,
    /// Set by a fleet-wide kill, cleared by the next reset.
    killed: bool,
}

impl FleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted snapshot.
    ///
    /// A worker saved mid-turn is put back to `Working` so the scheduler
    /// resumes it with a fresh session.
    pub fn from_snapshot(snapshot: FleetSnapshot) -> Self {
        let mut store = Self {
            logs: LogBook::from_global(snapshot.global_logs),
            artifacts: ArtifactRegistry::from_artifacts(snapshot.artifacts),
            ..Self::default()
        };

        for mut worker in snapshot.workers {
            if worker.status == WorkerStatus::Thinking {
                worker.status = WorkerStatus::Working;
            }
            store.names.insert(worker.name.clone(), worker.id);
            store.workers.push(worker);
        }
        store
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            workers: self.workers.clone(),
            global_logs: self.logs.global_snapshot(),
            artifacts: self.artifacts.all().to_vec(),
        }
    }

    // ── Workers ─────────────────────────────────────────────────────

    /// Create a worker for the spec, or update the existing worker with that name.
    ///
    /// An existing worker keeps its id, progress and attempt count. Only a
    /// worker awaiting recovery is re-armed to `Idle`; in-flight and
    /// terminal workers keep their status.
    pub fn upsert_by_name(&mut self, spec: &TaskSpec) -> Spawned {
        let existing = self.names.get(&spec.name).copied();
        if let Some(worker) = existing.and_then(|id| self.workers.iter_mut().find(|w| w.id == id)) {
            let id = worker.id;
            worker.role = spec.role.clone();
            worker.current_task = spec.task.clone();
            worker.dependencies = spec.dependencies.clone();
            worker.updated_at = Utc::now();
            if worker.status == WorkerStatus::AwaitingRecovery
                && worker.transition_to(WorkerStatus::Idle).is_ok()
            {
                worker.last_error_message = None;
            }
            return Spawned::Updated(id);
        }

        let worker = Worker::new(
            spec.name.clone(),
            spec.role.clone(),
            spec.task.clone(),
            spec.dependencies.clone(),
        );
        let id = worker.id;
        self.names.insert(worker.name.clone(), id);
        self.workers.push(worker);
        Spawned::Created(id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Worker> {
        self.workers.iter().find(|w| w.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Worker> {
        self.names.get(name).and_then(|id| self.get(*id))
    }

    /// Mutate a worker in place.
    pub fn update<F, R>(&mut self, id: Uuid, f: F) -> Result<R, FleetError>
    where
        F: FnOnce(&mut Worker) -> R,
    {
        let worker = self
            .workers
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(FleetError::WorkerNotFound { id })?;
        Ok(f(worker))
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Resolve a worker's dependency names against the current fleet.
    pub fn resolve_dependencies(&self, worker: &Worker) -> Vec<DependencyStatus> {
        worker
            .dependencies
            .iter()
            .map(|name| DependencyStatus {
                name: name.clone(),
                status: self.by_name(name).map(|w| w.status),
            })
            .collect()
    }

    /// Latch policy: resume a `Working` worker before starting an `Idle` one.
    /// Ties go to the earliest spawned.
    pub fn next_candidate(&self) -> Option<Uuid> {
        self.workers
            .iter()
            .filter(|w| w.status.is_schedulable())
            .min_by_key(|w| w.status != WorkerStatus::Working)
            .map(|w| w.id)
    }

    /// Workers currently mid-turn.
    pub fn in_turn(&self) -> Vec<Uuid> {
        self.workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Thinking)
            .map(|w| w.id)
            .collect()
    }

    /// First worker still eligible for a remediation attempt.
    pub fn recovery_candidate(&self) -> Option<Uuid> {
        self.workers
            .iter()
            .find(|w| w.can_retry_recovery())
            .map(|w| w.id)
    }

    /// Workers awaiting recovery with no attempts left.
    pub fn exhausted_recovery(&self) -> Vec<Uuid> {
        self.workers
            .iter()
            .filter(|w| {
                w.status == WorkerStatus::AwaitingRecovery
                    && w.recovery_attempts >= MAX_RECOVERY_ATTEMPTS
            })
            .map(|w| w.id)
            .collect()
    }

    /// Kill every non-terminal worker. Returns the ids that changed.
    pub fn kill_all(&mut self) -> Vec<Uuid> {
        self.killed = true;
        self.workers
            .iter_mut()
            .filter_map(|w| w.kill().then_some(w.id))
            .collect()
    }

    /// Whether the fleet was killed since the last reset.
    pub fn is_killed(&self) -> bool {
        self.killed
    }

    /// Discard everything the previous fleet left behind, logs included.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts {
            total: self.workers.len(),
            ..StatusCounts::default()
        };
        for worker in &self.workers {
            match worker.status {
                WorkerStatus::Idle => counts.idle += 1,
                WorkerStatus::Working => counts.working += 1,
                WorkerStatus::Thinking => counts.thinking += 1,
                WorkerStatus::Completed => counts.completed += 1,
                WorkerStatus::AwaitingRecovery => counts.awaiting_recovery += 1,
                WorkerStatus::Error => counts.error += 1,
                WorkerStatus::Killed => counts.killed += 1,
            }
        }
        counts
    }

    // ── Logs ────────────────────────────────────────────────────────

    pub fn log(
        &mut self,
        kind: LogKind,
        message: impl Into<String>,
        worker_id: Option<Uuid>,
    ) -> LogEntry {
        let entry = LogEntry::new(kind, message, worker_id);
        self.logs.push(entry.clone());
        entry
    }

    pub fn logs(&self) -> &LogBook {
        &self.logs
    }

    // ── Artifacts ───────────────────────────────────────────────────

    pub fn artifacts(&self) -> &ArtifactRegistry {
        &self.artifacts
    }

    pub fn artifacts_mut(&mut self) -> &mut ArtifactRegistry {
        &mut self.artifacts
    }

    // ── Broadcast ───────────────────────────────────────────────────

    pub fn set_broadcast(&mut self, event: BroadcastEvent) {
        self.broadcast = Some(event);
    }

    /// The live broadcast, if it has not expired.
    pub fn current_broadcast(&self, now: DateTime<Utc>) -> Option<&BroadcastEvent> {
        self.broadcast.as_ref().filter(|b| !b.is_expired_at(now))
    }

    /// Clear an expired broadcast. Returns true if one was cleared.
    pub fn expire_broadcast(&mut self, now: DateTime<Utc>) -> bool {
        if self.broadcast.as_ref().is_some_and(|b| b.is_expired_at(now)) {
            self.broadcast = None;
            return true;
        }
        false
    }
}
