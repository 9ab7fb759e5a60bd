//! Per-worker stepper sessions.
//!
//! Sessions are not serializable and never persisted. A session is created
//! the first time a worker takes a turn (including after a restore), keyed by
//! worker id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::llm::StepSession;
use crate::llm::prompts::worker_system_prompt;
use crate::worker::state::Worker;

/// Shared handle to one worker's session.
pub type SessionHandle = Arc<Mutex<StepSession>>;

/// Rehydrate-on-demand session registry.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the worker's session, creating it from the worker record if missing.
    pub async fn get_or_create(&self, worker: &Worker) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(&worker.id) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write().await;
        let handle = sessions.entry(worker.id).or_insert_with(|| {
            tracing::debug!(worker_id = %worker.id, name = %worker.name, "Creating stepper session");
            Arc::new(Mutex::new(StepSession::new(
                worker.id,
                worker_system_prompt(&worker.name, &worker.role, &worker.current_task),
            )))
        });
        Arc::clone(handle)
    }

    /// Drop one worker's session so the next turn starts a fresh dialogue.
    pub async fn remove(&self, worker_id: Uuid) -> bool {
        self.sessions.write().await.remove(&worker_id).is_some()
    }

    pub async fn contains(&self, worker_id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&worker_id)
    }

    /// Discard every session.
    pub async fn clear(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        count
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    fn worker() -> Worker {
        Worker::new("Ada", "engineer", "Write the parser", vec![])
    }

    #[tokio::test]
    async fn creates_lazily_and_reuses() {
        let registry = SessionRegistry::new();
        let w = worker();
        assert!(!registry.contains(w.id).await);

        let first = registry.get_or_create(&w).await;
        first.lock().await.messages.push(ChatMessage::user("hello"));

        let second = registry.get_or_create(&w).await;
        assert_eq!(second.lock().await.messages.len(), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn system_prompt_built_from_worker() {
        let registry = SessionRegistry::new();
        let w = worker();
        let handle = registry.get_or_create(&w).await;
        let session = handle.lock().await;
        assert_eq!(session.worker_id, w.id);
        assert!(session.system_prompt.contains("Ada"));
        assert!(session.system_prompt.contains("Write the parser"));
    }

    #[tokio::test]
    async fn clear_discards_everything() {
        let registry = SessionRegistry::new();
        registry.get_or_create(&worker()).await;
        registry.get_or_create(&worker()).await;
        assert_eq!(registry.clear().await, 2);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn remove_single_session() {
        let registry = SessionRegistry::new();
        let w = worker();
        registry.get_or_create(&w).await;
        assert!(registry.remove(w.id).await);
        assert!(!registry.remove(w.id).await);
    }
}
