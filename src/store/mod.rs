//! Persistence layer — snapshot storage for the fleet.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlSnapshotStore;
pub use memory::MemorySnapshotStore;
pub use traits::{FleetSnapshot, SnapshotStore};
