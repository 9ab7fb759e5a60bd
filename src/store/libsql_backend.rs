//! libSQL backend — async `SnapshotStore` implementation.
//!
//! The snapshot is stored as one JSON row. Supports local file and
//! in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{FleetSnapshot, SnapshotStore};

/// libSQL snapshot store.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlSnapshotStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlSnapshotStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Snapshot database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

#[async_trait]
impl SnapshotStore for LibSqlSnapshotStore {
    async fn load(&self) -> Result<Option<FleetSnapshot>, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT payload FROM fleet_snapshot WHERE id = 1", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("load_snapshot: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("load_snapshot: {e}")))?;

        match row {
            Some(row) => {
                let payload: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("load_snapshot row parse: {e}")))?;
                let snapshot: FleetSnapshot = serde_json::from_str(&payload)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
                debug!(workers = snapshot.workers.len(), "Snapshot loaded");
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &FleetSnapshot) -> Result<(), DatabaseError> {
        let payload = serde_json::to_string(snapshot)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO fleet_snapshot (id, payload, worker_count, saved_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    payload = excluded.payload,
                    worker_count = excluded.worker_count,
                    saved_at = excluded.saved_at",
                params![payload, snapshot.workers.len() as i64, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_snapshot: {e}")))?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM fleet_snapshot", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("clear_snapshot: {e}")))?;
        Ok(())
    }
}
