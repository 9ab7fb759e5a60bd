//! Narrative log: a bounded global ring plus unbounded per-worker history.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Global log entries retained before the oldest are dropped.
pub const GLOBAL_LOG_CAPACITY: usize = 100;

/// Kind of narrated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Error,
    Success,
    Thought,
    Artifact,
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Error => "error",
            Self::Success => "success",
            Self::Thought => "thought",
            Self::Artifact => "artifact",
        };
        write!(f, "{s}")
    }
}

/// An immutable narrated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub message: String,
    #[serde(default)]
    pub worker_id: Option<Uuid>,
}

impl LogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>, worker_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            message: message.into(),
            worker_id,
        }
    }
}

/// Append-only log book.
#[derive(Debug, Clone, Default)]
pub struct LogBook {
    global: VecDeque<LogEntry>,
    per_worker: HashMap<Uuid, Vec<LogEntry>>,
}

impl LogBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted global ring. Per-worker history is recovered
    /// from whatever the ring still holds.
    pub fn from_global(entries: Vec<LogEntry>) -> Self {
        let mut book = Self::new();
        for entry in entries {
            book.push(entry);
        }
        book
    }

    /// Append an entry, pruning the global ring to capacity.
    pub fn push(&mut self, entry: LogEntry) {
        if let Some(worker_id) = entry.worker_id {
            self.per_worker
                .entry(worker_id)
                .or_default()
                .push(entry.clone());
        }

        self.global.push_back(entry);
        while self.global.len() > GLOBAL_LOG_CAPACITY {
            self.global.pop_front();
        }
    }

    /// Global entries, oldest first.
    pub fn global(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.global.iter()
    }

    pub fn global_len(&self) -> usize {
        self.global.len()
    }

    pub fn global_snapshot(&self) -> Vec<LogEntry> {
        self.global.iter().cloned().collect()
    }

    /// Full history for one worker, oldest first.
    pub fn for_worker(&self, worker_id: Uuid) -> &[LogEntry] {
        self.per_worker
            .get(&worker_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
