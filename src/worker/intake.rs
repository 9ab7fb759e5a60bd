//! Plan intake: turn a directive into a fresh fleet.
//!
//! A new directive replaces the current fleet. Existing workers, their
//! sessions, artifacts, logs and the persisted snapshot are discarded before
//! the planner is called, so nothing from the old fleet reaches the new
//! fleet's shared context. If the planner fails or returns nothing, a single
//! fallback worker is spawned so the directive still gets attempted.

use uuid::Uuid;

use crate::error::FleetError;
use crate::llm::TaskSpec;
use crate::worker::events::FleetEvent;
use crate::worker::fleet::Spawned;
use crate::worker::log::LogKind;
use crate::worker::orchestrator::Orchestrator;

pub const FALLBACK_WORKER_NAME: &str = "Generalist";
pub const FALLBACK_WORKER_ROLE: &str = "full-stack engineer";
pub const FALLBACK_WORKER_TASK: &str =
    "Plan and deliver a minimal working solution for the directive, one file at a time.";

/// Result of a successful intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeOutcome {
    pub spawned: Vec<Uuid>,
    /// True if the planner failed and the fallback worker was used.
    pub fallback: bool,
}

/// The single worker used when planning fails.
///
/// The task is the fixed generic instruction followed by the directive text,
/// so the worker knows what it is meant to deliver.
pub fn fallback_spec(directive: &str) -> TaskSpec {
    TaskSpec::new(
        FALLBACK_WORKER_NAME,
        FALLBACK_WORKER_ROLE,
        format!("{FALLBACK_WORKER_TASK}\nDirective: {directive}"),
    )
}

impl Orchestrator {
    /// Submit a directive.
    ///
    /// Fails with [`FleetError::Busy`] while another planning call (intake or
    /// recovery) is outstanding.
    pub async fn submit_directive(&self, directive: &str) -> Result<IntakeOutcome, FleetError> {
        let directive = directive.trim();
        if directive.is_empty() {
            return Err(FleetError::EmptyDirective);
        }
        let _orchestrating = self.orchestration.try_lock().map_err(|_| FleetError::Busy)?;

        let had_workers = {
            let mut store = self.store.write().await;
            let had_workers = !store.is_empty();
            store.reset();
            self.log_locked(
                &mut store,
                LogKind::Info,
                format!("New directive: {directive}"),
                None,
            );
            had_workers
        };

        if had_workers {
            let sessions = self.sessions.clear().await;
            self.clear_persisted().await;
            tracing::info!(sessions, "Previous fleet discarded");
        }
        self.emit(FleetEvent::FleetReset {
            directive: directive.to_string(),
        });

        let (specs, fallback) = match self.deps.planner.plan(directive).await {
            Ok(plan) if !plan.tasks.is_empty() => (plan.tasks, false),
            Ok(_) => {
                tracing::warn!("Planner returned no tasks, using fallback worker");
                (vec![fallback_spec(directive)], true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Planner failed, using fallback worker");
                (vec![fallback_spec(directive)], true)
            }
        };

        let spawned = {
            let mut store = self.store.write().await;
            if fallback {
                self.log_locked(
                    &mut store,
                    LogKind::Error,
                    "Planning failed, falling back to a single worker",
                    None,
                );
            }

            let mut spawned = Vec::with_capacity(specs.len());
            for spec in &specs {
                let result = store.upsert_by_name(spec);
                let id = result.id();
                let verb = match result {
                    Spawned::Created(_) => "Spawned",
                    Spawned::Updated(_) => "Updated",
                };
                if let Some(worker) = store.get(id).cloned() {
                    self.log_locked(
                        &mut store,
                        LogKind::Info,
                        format!("{verb} {} ({}): {}", worker.name, worker.role, worker.current_task),
                        Some(id),
                    );
                    self.emit(FleetEvent::WorkerUpdated { worker });
                }
                if !spawned.contains(&id) {
                    spawned.push(id);
                }
            }
            spawned
        };

        self.persist().await;
        tracing::info!(workers = spawned.len(), fallback, "Directive accepted");

        Ok(IntakeOutcome { spawned, fallback })
    }
}
