//! Worker record and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FleetError;

/// Recovery attempts a worker gets before it is forced to `Error`.
pub const MAX_RECOVERY_ATTEMPTS: u32 = 3;

/// Progress added by a turn that did not finish the task.
pub const PROGRESS_STEP: u8 = 15;

/// Highest progress a worker can report before it completes.
pub const MAX_INCOMPLETE_PROGRESS: u8 = 99;

/// Task label for workers that ran out of recovery attempts.
pub const MANUAL_INTERVENTION_LABEL: &str = "Manual intervention required";

/// Task label for workers stopped by a fleet-wide kill.
pub const TERMINATED_LABEL: &str = "Terminated";

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Spawned, waiting for its first turn.
    Idle,
    /// Has had at least one turn and is waiting for the next.
    Working,
    /// A stepper call is in flight for this worker.
    Thinking,
    /// Task finished.
    Completed,
    /// Last turn failed; waiting for the recovery manager.
    AwaitingRecovery,
    /// Unrecoverable.
    Error,
    /// Stopped by a fleet-wide kill.
    Killed,
}

impl WorkerStatus {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: WorkerStatus) -> bool {
        use WorkerStatus::*;

        if target == Killed {
            return !self.is_terminal();
        }

        matches!(
            (self, target),
            (Idle, Working) |
            (Working, Thinking) |
            (Thinking, Completed) | (Thinking, Working) | (Thinking, AwaitingRecovery) |
            (AwaitingRecovery, Idle) | (AwaitingRecovery, Error)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Killed)
    }

    /// Whether the scheduler may hand this worker a turn.
    pub fn is_schedulable(&self) -> bool {
        matches!(self, Self::Idle | Self::Working)
    }

    pub const ALL: [WorkerStatus; 7] = [
        Self::Idle,
        Self::Working,
        Self::Thinking,
        Self::Completed,
        Self::AwaitingRecovery,
        Self::Error,
        Self::Killed,
    ];
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Thinking => "thinking",
            Self::Completed => "completed",
            Self::AwaitingRecovery => "awaiting_recovery",
            Self::Error => "error",
            Self::Killed => "killed",
        };
        write!(f, "{s}")
    }
}

/// A single worker in the fleet.
///
/// Dependencies are held as worker *names* and resolved through the fleet's
/// name index when needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub status: WorkerStatus,
    /// 0..=100; 100 only once completed.
    pub progress: u8,
    pub current_task: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Synthetic counter, never decreases while the worker is active.
    #[serde(default)]
    pub memory_usage: u64,
    #[serde(default)]
    pub recovery_attempts: u32,
    #[serde(default)]
    pub last_error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Worker {
    /// Create a new idle worker.
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        task: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role: role.into(),
            status: WorkerStatus::Idle,
            progress: 0,
            current_task: task.into(),
            dependencies,
            memory_usage: 0,
            recovery_attempts: 0,
            last_error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to a new state.
    pub fn transition_to(&mut self, target: WorkerStatus) -> Result<(), FleetError> {
        if !self.status.can_transition_to(target) {
            return Err(FleetError::InvalidTransition {
                id: self.id,
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }

        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a turn that did not finish the task.
    pub fn advance(&mut self) {
        self.progress = self
            .progress
            .saturating_add(PROGRESS_STEP)
            .min(MAX_INCOMPLETE_PROGRESS);
    }

    /// Record a finished task.
    pub fn complete(&mut self) -> Result<(), FleetError> {
        self.transition_to(WorkerStatus::Completed)?;
        self.progress = 100;
        Ok(())
    }

    /// Move to `AwaitingRecovery` with the failure detail.
    pub fn fail_turn(&mut self, reason: impl Into<String>) -> Result<(), FleetError> {
        self.transition_to(WorkerStatus::AwaitingRecovery)?;
        self.last_error_message = Some(reason.into());
        Ok(())
    }

    /// Force to terminal `Error` after recovery is exhausted or failed.
    pub fn give_up(&mut self, reason: Option<String>) -> Result<(), FleetError> {
        self.transition_to(WorkerStatus::Error)?;
        self.current_task = MANUAL_INTERVENTION_LABEL.to_string();
        if reason.is_some() {
            self.last_error_message = reason;
        }
        Ok(())
    }

    /// Stop the worker as part of a fleet-wide kill. No-op for terminal workers.
    pub fn kill(&mut self) -> bool {
        if self.transition_to(WorkerStatus::Killed).is_err() {
            return false;
        }
        self.progress = 0;
        self.current_task = TERMINATED_LABEL.to_string();
        true
    }

    /// Whether the recovery manager may still try to fix this worker.
    pub fn can_retry_recovery(&self) -> bool {
        self.status == WorkerStatus::AwaitingRecovery
            && self.recovery_attempts < MAX_RECOVERY_ATTEMPTS
    }

    /// Count a remediation cycle against this worker. Never exceeds the ceiling.
    pub fn record_recovery_attempt(&mut self) {
        self.recovery_attempts = (self.recovery_attempts + 1).min(MAX_RECOVERY_ATTEMPTS);
        self.updated_at = Utc::now();
    }

    pub fn add_memory(&mut self, amount: u64) {
        self.memory_usage = self.memory_usage.saturating_add(amount);
    }
}
