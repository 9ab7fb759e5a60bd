//! Turn executor: run one stepper turn for one worker and apply the result.
//!
//! A turn moves the worker `Working -> Thinking`, gathers the shared context,
//! known artifact paths and dependency statuses, calls the stepper, and then
//! writes back artifacts, a log entry, an optional broadcast and the new
//! status. Stepper failures park the worker in `AwaitingRecovery`.
//!
//! The result of a turn is only applied if the worker is still `Thinking` at
//! write-back. A kill or a fleet reset during the call discards it. A worker
//! reassigned by recovery during the call keeps the turn's output but goes
//! back to `Working` on its new task instead of completing.

use rand::Rng;
use uuid::Uuid;

use crate::config::FleetConfig;
use crate::error::FleetError;
use crate::llm::StepRequest;
use crate::worker::artifacts::{FileBlock, parse_file_blocks, strip_file_blocks};
use crate::worker::context::shared_context;
use crate::worker::events::{BroadcastEvent, FleetEvent};
use crate::worker::fleet::FleetStore;
use crate::worker::log::LogKind;
use crate::worker::orchestrator::Orchestrator;
use crate::worker::state::{Worker, WorkerStatus};

/// Synthetic memory growth per turn, in KiB.
const MEMORY_GROWTH_KIB: std::ops::RangeInclusive<u64> = 64..=512;

/// What happened to a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The worker emitted the completion token.
    Completed,
    /// The worker made progress and stays `Working`.
    Progressed { progress: u8 },
    /// The worker got a new task during the call and resumes with it.
    Reassigned,
    /// The stepper failed; the worker awaits recovery.
    Failed { reason: String },
    /// The worker changed underneath the turn; the result was dropped.
    Discarded,
    /// The worker could not start a turn.
    Skipped,
}

/// A stepper response broken into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub files: Vec<FileBlock>,
    /// Response with file blocks and the completion token removed.
    pub display: String,
    pub completed: bool,
    /// Announcement body if the display starts with the broadcast prefix.
    pub broadcast: Option<String>,
}

/// Split a raw stepper response.
pub fn interpret_response(raw: &str, config: &FleetConfig) -> TurnReport {
    let files = parse_file_blocks(raw);
    let completed = !config.completion_token.is_empty() && raw.contains(&config.completion_token);

    let mut display = strip_file_blocks(raw);
    if !config.completion_token.is_empty() {
        display = display.replace(&config.completion_token, "");
    }
    let display = display.trim().to_string();

    let broadcast = if config.broadcast_prefix.is_empty() {
        None
    } else {
        display
            .strip_prefix(&config.broadcast_prefix)
            .map(|body| body.trim().to_string())
    };

    TurnReport {
        files,
        display,
        completed,
        broadcast,
    }
}

fn log_message(worker: &Worker, report: &TurnReport) -> String {
    if !report.display.is_empty() {
        return format!("{}: {}", worker.name, report.display);
    }
    if report.files.is_empty() {
        return format!("{}: (no output)", worker.name);
    }
    let paths: Vec<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
    format!("{} wrote {}", worker.name, paths.join(", "))
}

impl Orchestrator {
    /// Execute one turn for a `Working` worker.
    ///
    /// Never returns an error: every failure is recorded on the worker.
    pub(crate) async fn run_turn(&self, worker_id: Uuid) -> TurnOutcome {
        let (worker, context, known_paths, dependencies) = {
            let mut store = self.store.write().await;
            let started = store.update(worker_id, |w| {
                w.transition_to(WorkerStatus::Thinking)?;
                Ok::<_, FleetError>(w.clone())
            });
            let worker = match started {
                Ok(Ok(worker)) => worker,
                Ok(Err(e)) | Err(e) => {
                    tracing::warn!(%worker_id, error = %e, "Turn skipped");
                    return TurnOutcome::Skipped;
                }
            };
            let context = shared_context(store.logs().global(), &self.config.broadcast_prefix);
            let known_paths = store.artifacts().paths();
            let dependencies = store.resolve_dependencies(&worker);
            self.emit(FleetEvent::WorkerUpdated {
                worker: worker.clone(),
            });
            (worker, context, known_paths, dependencies)
        };

        tracing::debug!(worker = %worker.name, "Turn started");

        let session = self.sessions.get_or_create(&worker).await;
        let result = {
            let mut session = session.lock().await;
            let result = self
                .deps
                .stepper
                .step(
                    &mut session,
                    StepRequest {
                        worker_name: &worker.name,
                        shared_context: &context,
                        task: &worker.current_task,
                        known_paths: &known_paths,
                        dependencies: &dependencies,
                    },
                )
                .await;
            tracing::debug!(worker = %worker.name, turns = session.turns(), "Stepper returned");
            result
        };

        let outcome = match result {
            Ok(raw) => self.apply_response(&worker, &raw).await,
            Err(e) => self.apply_failure(&worker, e.to_string()).await,
        };

        if outcome == TurnOutcome::Discarded {
            self.sessions.remove(worker.id).await;
        } else {
            self.persist().await;
        }
        outcome
    }

    async fn apply_response(&self, worker: &Worker, raw: &str) -> TurnOutcome {
        let report = interpret_response(raw, &self.config);
        let mut store = self.store.write().await;

        let Some(live) = store
            .get(worker.id)
            .filter(|w| w.status == WorkerStatus::Thinking)
        else {
            tracing::warn!(worker = %worker.name, "Worker changed during turn, result discarded");
            return TurnOutcome::Discarded;
        };
        let reassigned = live.current_task != worker.current_task;
        let completed = report.completed && !reassigned;

        for block in &report.files {
            let artifact = store
                .artifacts_mut()
                .upsert(&block.path, &block.content, &worker.name)
                .clone();
            tracing::debug!(worker = %worker.name, path = %artifact.path, "Artifact written");
            self.emit(FleetEvent::ArtifactWritten { artifact });
        }

        let kind = if !report.files.is_empty() {
            LogKind::Artifact
        } else if report.broadcast.is_some() {
            LogKind::Info
        } else {
            LogKind::Thought
        };
        self.log_locked(&mut store, kind, log_message(worker, &report), Some(worker.id));

        if let Some(body) = &report.broadcast {
            let event = BroadcastEvent::new(worker.id, body.clone());
            store.set_broadcast(event.clone());
            self.emit(FleetEvent::Broadcast { event });
        }

        let memory = rand::thread_rng().gen_range(MEMORY_GROWTH_KIB);
        let applied = store.update(worker.id, |w| {
            w.add_memory(memory);
            if completed {
                w.complete()?;
            } else {
                w.transition_to(WorkerStatus::Working)?;
                if !reassigned {
                    w.advance();
                }
            }
            Ok::<_, FleetError>(w.clone())
        });

        let updated = match applied {
            Ok(Ok(updated)) => updated,
            Ok(Err(e)) | Err(e) => {
                tracing::warn!(worker = %worker.name, error = %e, "Turn write-back failed");
                return TurnOutcome::Discarded;
            }
        };

        if completed {
            self.log_locked(
                &mut store,
                LogKind::Success,
                format!("{} completed: {}", updated.name, updated.current_task),
                Some(worker.id),
            );
        } else if reassigned {
            self.log_reassigned(&mut store, &updated);
        }
        self.emit(FleetEvent::WorkerUpdated {
            worker: updated.clone(),
        });

        if completed {
            tracing::info!(worker = %updated.name, "Worker completed");
            TurnOutcome::Completed
        } else if reassigned {
            TurnOutcome::Reassigned
        } else {
            TurnOutcome::Progressed {
                progress: updated.progress,
            }
        }
    }

    async fn apply_failure(&self, worker: &Worker, reason: String) -> TurnOutcome {
        let mut store = self.store.write().await;

        let failed = store.update(worker.id, |w| {
            if w.status != WorkerStatus::Thinking {
                return None;
            }
            if w.current_task != worker.current_task {
                // The failure belongs to the old task.
                return w.transition_to(WorkerStatus::Working).ok().map(|()| (w.clone(), true));
            }
            w.fail_turn(reason.clone()).ok().map(|()| (w.clone(), false))
        });
        let Ok(Some((updated, reassigned))) = failed else {
            tracing::warn!(worker = %worker.name, "Worker changed during failed turn, error discarded");
            return TurnOutcome::Discarded;
        };
        if reassigned {
            tracing::warn!(worker = %worker.name, error = %reason, "Turn for a replaced task failed");
            self.log_reassigned(&mut store, &updated);
            self.emit(FleetEvent::WorkerUpdated { worker: updated });
            return TurnOutcome::Reassigned;
        }

        tracing::warn!(worker = %worker.name, error = %reason, "Turn failed");
        self.log_locked(
            &mut store,
            LogKind::Error,
            format!("{} failed: {reason}", worker.name),
            Some(worker.id),
        );
        self.emit(FleetEvent::WorkerUpdated { worker: updated });

        TurnOutcome::Failed { reason }
    }

    fn log_reassigned(&self, store: &mut FleetStore, worker: &Worker) {
        tracing::info!(worker = %worker.name, "Worker reassigned during turn");
        self.log_locked(
            store,
            LogKind::Info,
            format!("{} reassigned mid-turn, continuing with: {}", worker.name, worker.current_task),
            Some(worker.id),
        );
    }
}
