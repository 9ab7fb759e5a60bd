//! Fleet events fanned out to subscribers (WebSocket clients, tests).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::FleetSnapshot;
use crate::worker::artifacts::Artifact;
use crate::worker::fleet::StatusCounts;
use crate::worker::log::LogEntry;
use crate::worker::state::Worker;

/// How long a broadcast stays visible.
pub const BROADCAST_TTL: std::time::Duration = std::time::Duration::from_secs(3);

/// A transient cross-worker announcement. Only one is visible at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastEvent {
    pub source_id: Uuid,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl BroadcastEvent {
    pub fn new(source_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            source_id,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.timestamp)
            .to_std()
            .map(|age| age >= BROADCAST_TTL)
            .unwrap_or(false)
    }
}

/// Messages sent to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FleetEvent {
    /// Full state (sent on connect and after lag).
    FleetSync {
        snapshot: FleetSnapshot,
        counts: StatusCounts,
    },
    /// A worker's record changed.
    WorkerUpdated { worker: Worker },
    /// A log entry was appended.
    Log { entry: LogEntry },
    /// An artifact was written or overwritten.
    ArtifactWritten { artifact: Artifact },
    /// A worker broadcast to the team.
    Broadcast { event: BroadcastEvent },
    /// A new directive replaced the fleet.
    FleetReset { directive: String },
    /// Every live worker was killed.
    FleetKilled { killed: usize },
}
