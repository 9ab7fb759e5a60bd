//! In-memory snapshot store, for tests and ephemeral runs.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::store::traits::{FleetSnapshot, SnapshotStore};

#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: RwLock<Option<FleetSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: FleetSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<FleetSnapshot>, DatabaseError> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save(&self, snapshot: &FleetSnapshot) -> Result<(), DatabaseError> {
        *self.snapshot.write().await = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), DatabaseError> {
        *self.snapshot.write().await = None;
        Ok(())
    }
}
