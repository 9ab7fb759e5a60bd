//! Scheduler: pick the next worker and run its turn.
//!
//! At most one turn is in flight fleet-wide. After a turn ends the scheduler
//! waits for the configured cool-down before starting another. Selection
//! follows the latch policy: a `Working` worker is resumed before any `Idle`
//! worker is started.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::worker::events::FleetEvent;
use crate::worker::orchestrator::Orchestrator;
use crate::worker::state::WorkerStatus;
use crate::worker::turn::TurnOutcome;

/// Result of a single scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another turn is still running.
    TurnInFlight,
    /// The last turn ended too recently.
    CoolingDown { remaining: Duration },
    /// No worker is `Working` or `Idle`.
    NothingToDo,
    /// A turn ran to completion.
    Turn {
        worker_id: Uuid,
        outcome: TurnOutcome,
    },
}

/// Drives worker turns.
pub struct Scheduler {
    fleet: Arc<Orchestrator>,
}

impl Scheduler {
    pub fn new(fleet: Arc<Orchestrator>) -> Self {
        Self { fleet }
    }

    /// Run at most one turn.
    pub async fn tick(&self) -> TickOutcome {
        self.expire_broadcast().await;

        let Ok(mut gate) = self.fleet.turn_gate.try_lock() else {
            return TickOutcome::TurnInFlight;
        };
        if let Some(remaining) = gate.cooldown_remaining(self.fleet.config.turn_cooldown) {
            return TickOutcome::CoolingDown { remaining };
        }

        let Some(worker_id) = self.select().await else {
            return TickOutcome::NothingToDo;
        };

        let outcome = self.fleet.run_turn(worker_id).await;
        gate.finish();

        TickOutcome::Turn { worker_id, outcome }
    }

    /// Pick the next worker, starting it if it is `Idle`.
    async fn select(&self) -> Option<Uuid> {
        let mut store = self.fleet.store.write().await;
        let id = store.next_candidate()?;

        let started = store
            .update(id, |w| {
                if w.status == WorkerStatus::Idle {
                    w.transition_to(WorkerStatus::Working).ok()?;
                    return Some(w.clone());
                }
                None
            })
            .ok()
            .flatten();

        if let Some(worker) = started {
            tracing::info!(worker = %worker.name, "Worker started");
            self.fleet.emit(FleetEvent::WorkerUpdated { worker });
        }
        Some(id)
    }

    async fn expire_broadcast(&self) {
        let expired = self.fleet.store.write().await.expire_broadcast(Utc::now());
        if expired {
            tracing::debug!("Broadcast expired");
        }
    }
}

/// Spawn the periodic scheduler loop.
pub fn spawn_scheduler(fleet: Arc<Orchestrator>) -> JoinHandle<()> {
    let interval = fleet.config.tick_interval;
    let scheduler = Scheduler::new(fleet);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let TickOutcome::Turn { worker_id, outcome } = scheduler.tick().await {
                tracing::debug!(%worker_id, ?outcome, "Scheduler tick");
            }
        }
    })
}
