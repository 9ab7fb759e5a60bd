//! `SnapshotStore` trait — load/save interface for the fleet's persisted state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::worker::artifacts::Artifact;
use crate::worker::log::LogEntry;
use crate::worker::state::Worker;

/// Everything that survives a restart. Stepper sessions are not persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub workers: Vec<Worker>,
    pub global_logs: Vec<LogEntry>,
    pub artifacts: Vec<Artifact>,
}

impl FleetSnapshot {
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty() && self.global_logs.is_empty() && self.artifacts.is_empty()
    }
}

/// Backend-agnostic snapshot persistence.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot, if any.
    async fn load(&self) -> Result<Option<FleetSnapshot>, DatabaseError>;

    /// Replace the saved snapshot.
    async fn save(&self, snapshot: &FleetSnapshot) -> Result<(), DatabaseError>;

    /// Remove the saved snapshot entirely.
    async fn clear(&self) -> Result<(), DatabaseError>;
}
