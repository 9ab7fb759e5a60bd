//! Recovery manager: ask the planner to remediate failed workers.
//!
//! Each check first sweeps workers that have used up their attempts into
//! `Error`. Then, if no other planning call is outstanding, it picks one
//! worker in `AwaitingRecovery` and asks the planner for a remediation plan.
//! Every applied plan counts as one attempt against that worker, so the
//! loop always terminates. A planner failure ends recovery for the worker.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::llm::TaskSpec;
use crate::worker::events::FleetEvent;
use crate::worker::fleet::Spawned;
use crate::worker::log::LogKind;
use crate::worker::orchestrator::Orchestrator;
use crate::worker::state::{MAX_RECOVERY_ATTEMPTS, Worker, WorkerStatus};

/// What the remediation step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Another planning call is outstanding.
    Busy,
    /// No worker awaits recovery.
    Idle,
    /// A remediation plan was applied.
    Remediated { worker_id: Uuid, tasks: usize },
    /// The planner failed; the worker is now in `Error`.
    GaveUp { worker_id: Uuid },
    /// The worker left `AwaitingRecovery` while the planner ran.
    Discarded { worker_id: Uuid },
}

/// Result of one recovery check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Workers moved to `Error` for exhausting their attempts.
    pub swept: Vec<Uuid>,
    pub action: RecoveryAction,
}

/// Build the planner directive for a failed worker.
pub fn remediation_directive(worker: &Worker) -> String {
    let error = worker
        .last_error_message
        .as_deref()
        .unwrap_or("unknown error");
    format!(
        "Worker \"{name}\" (role: {role}) failed while working on: {task}\n\
         Error: {error}\n\
         Produce a remediation plan. To retry or rework the failed task, reuse the \
         name \"{name}\"; add new workers only if the fix needs them.",
        name = worker.name,
        role = worker.role,
        task = worker.current_task,
    )
}

/// Periodic remediation of failed workers.
pub struct RecoveryManager {
    fleet: Arc<Orchestrator>,
}

impl RecoveryManager {
    pub fn new(fleet: Arc<Orchestrator>) -> Self {
        Self { fleet }
    }

    /// Run one recovery check.
    pub async fn tick(&self) -> RecoveryReport {
        let swept = self.sweep_exhausted().await;
        let action = self.remediate_one().await;
        if !swept.is_empty() || !matches!(action, RecoveryAction::Busy | RecoveryAction::Idle) {
            self.fleet.persist().await;
        }
        RecoveryReport { swept, action }
    }

    /// Move workers with no attempts left to `Error`.
    async fn sweep_exhausted(&self) -> Vec<Uuid> {
        let mut store = self.fleet.store.write().await;
        let mut swept = Vec::new();

        for id in store.exhausted_recovery() {
            let gave_up = store
                .update(id, |w| w.give_up(None).ok().map(|()| w.clone()))
                .ok()
                .flatten();
            let Some(worker) = gave_up else { continue };

            tracing::warn!(worker = %worker.name, "Recovery attempts exhausted");
            self.fleet.log_locked(
                &mut store,
                LogKind::Error,
                format!(
                    "{} failed {MAX_RECOVERY_ATTEMPTS} recovery attempts, manual intervention required",
                    worker.name
                ),
                Some(id),
            );
            self.fleet.emit(FleetEvent::WorkerUpdated { worker });
            swept.push(id);
        }
        swept
    }

    async fn remediate_one(&self) -> RecoveryAction {
        let Ok(_orchestrating) = self.fleet.orchestration.try_lock() else {
            return RecoveryAction::Busy;
        };

        let target = {
            let mut store = self.fleet.store.write().await;
            let Some(worker) = store
                .recovery_candidate()
                .and_then(|id| store.get(id).cloned())
            else {
                return RecoveryAction::Idle;
            };
            self.fleet.log_locked(
                &mut store,
                LogKind::Info,
                format!(
                    "Recovering {} (attempt {} of {MAX_RECOVERY_ATTEMPTS})",
                    worker.name,
                    worker.recovery_attempts + 1
                ),
                Some(worker.id),
            );
            worker
        };

        let directive = remediation_directive(&target);
        match self.fleet.deps.planner.plan(&directive).await {
            Ok(plan) if !plan.tasks.is_empty() => self.apply_plan(&target, &plan.tasks).await,
            Ok(_) => self.give_up(&target, "planner returned no remediation tasks").await,
            Err(e) => self.give_up(&target, &e.to_string()).await,
        }
    }

    async fn apply_plan(&self, target: &Worker, tasks: &[TaskSpec]) -> RecoveryAction {
        let mut refreshed = Vec::new();
        {
            let mut store = self.fleet.store.write().await;

            let counted = store
                .update(target.id, |w| {
                    if w.status != WorkerStatus::AwaitingRecovery {
                        return false;
                    }
                    w.record_recovery_attempt();
                    true
                })
                .unwrap_or(false);
            if !counted {
                tracing::warn!(worker = %target.name, "Worker changed during recovery, plan discarded");
                return RecoveryAction::Discarded {
                    worker_id: target.id,
                };
            }

            for spec in tasks {
                let result = store.upsert_by_name(spec);
                let verb = match result {
                    Spawned::Created(_) => "Spawned",
                    Spawned::Updated(id) => {
                        refreshed.push(id);
                        "Reassigned"
                    }
                };
                let Some(worker) = store.get(result.id()).cloned() else {
                    continue;
                };
                self.fleet.log_locked(
                    &mut store,
                    LogKind::Info,
                    format!("{verb} {} ({}): {}", worker.name, worker.role, worker.current_task),
                    Some(worker.id),
                );
                self.fleet.emit(FleetEvent::WorkerUpdated { worker });
            }

            // The troubled worker may not be named in the plan.
            if let Some(worker) = store.get(target.id).cloned() {
                self.fleet.emit(FleetEvent::WorkerUpdated { worker });
            }
        }

        // Reassigned workers start over with a prompt for their new task.
        for id in refreshed {
            self.fleet.sessions.remove(id).await;
        }

        tracing::info!(worker = %target.name, tasks = tasks.len(), "Remediation plan applied");
        RecoveryAction::Remediated {
            worker_id: target.id,
            tasks: tasks.len(),
        }
    }

    async fn give_up(&self, target: &Worker, reason: &str) -> RecoveryAction {
        let mut store = self.fleet.store.write().await;
        let gave_up = store
            .update(target.id, |w| {
                if w.status != WorkerStatus::AwaitingRecovery {
                    return None;
                }
                w.give_up(Some(reason.to_string())).ok().map(|()| w.clone())
            })
            .ok()
            .flatten();

        let Some(worker) = gave_up else {
            return RecoveryAction::Discarded {
                worker_id: target.id,
            };
        };

        tracing::warn!(worker = %worker.name, error = %reason, "Recovery planning failed");
        self.fleet.log_locked(
            &mut store,
            LogKind::Error,
            format!("Recovery failed for {}: {reason}", worker.name),
            Some(worker.id),
        );
        self.fleet.emit(FleetEvent::WorkerUpdated { worker });

        RecoveryAction::GaveUp {
            worker_id: target.id,
        }
    }
}

/// Spawn the periodic recovery loop.
pub fn spawn_recovery_loop(fleet: Arc<Orchestrator>) -> JoinHandle<()> {
    let interval = fleet.config.recovery_interval;
    let manager = RecoveryManager::new(fleet);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let report = manager.tick().await;
            if !report.swept.is_empty() || !matches!(report.action, RecoveryAction::Idle | RecoveryAction::Busy) {
                tracing::debug!(?report, "Recovery check");
            }
        }
    })
}
