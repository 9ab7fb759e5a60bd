//! Worker fleet: state, scheduling, recovery and intake.
//!
//! Core components:
//! - `state` — Worker record and status machine (Idle → Working ⇄ Thinking → Completed)
//! - `fleet` — In-memory entity store (workers, logs, artifacts, broadcast slot)
//! - `log` — Global ring log + per-worker histories
//! - `artifacts` — File-block parsing and the path-keyed artifact registry
//! - `context` — Shared context window built from recent activity
//! - `memory` — Per-worker stepper sessions
//! - `events` — Broadcast announcements and subscriber events
//! - `orchestrator` — Shared handle, turn gate and orchestration gate
//! - `turn` — Run one worker turn and apply the result
//! - `scheduler` — Latch-policy selection with single-flight turns and cool-down
//! - `recovery` — Planner-driven remediation of failed workers
//! - `intake` — Directive → fleet

pub mod artifacts;
pub mod context;
pub mod events;
pub mod fleet;
pub mod intake;
pub mod log;
pub mod memory;
pub mod orchestrator;
pub mod recovery;
pub mod scheduler;
pub mod state;
pub mod turn;

pub use artifacts::{Artifact, ArtifactRegistry};
pub use events::{BroadcastEvent, FleetEvent};
pub use fleet::{FleetStore, StatusCounts};
pub use intake::IntakeOutcome;
pub use log::{LogEntry, LogKind};
pub use orchestrator::{Orchestrator, OrchestratorDeps};
pub use recovery::{RecoveryAction, RecoveryManager, RecoveryReport, spawn_recovery_loop};
pub use scheduler::{Scheduler, TickOutcome, spawn_scheduler};
pub use state::{Worker, WorkerStatus};
pub use turn::TurnOutcome;
