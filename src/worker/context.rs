//! Context bus: shared awareness between workers.
//!
//! A worker never references another worker directly. Before each turn it
//! receives the messages of the most recent noteworthy log entries across the
//! whole fleet.

use crate::worker::log::{LogEntry, LogKind};

/// Qualifying entries included in the shared context.
pub const CONTEXT_WINDOW: usize = 5;

/// Separator between context entries.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Whether an entry is worth sharing with other workers.
fn is_shared(entry: &LogEntry, broadcast_prefix: &str) -> bool {
    matches!(
        entry.kind,
        LogKind::Success | LogKind::Artifact | LogKind::Thought
    ) || (!broadcast_prefix.is_empty() && entry.message.contains(broadcast_prefix))
}

/// Build the shared context from the global log (oldest first).
///
/// Takes the newest `CONTEXT_WINDOW` qualifying entries and joins their
/// messages in chronological order.
pub fn shared_context<'a, I>(global: I, broadcast_prefix: &str) -> String
where
    I: DoubleEndedIterator<Item = &'a LogEntry>,
{
    let mut recent: Vec<&str> = global
        .rev()
        .filter(|entry| is_shared(entry, broadcast_prefix))
        .take(CONTEXT_WINDOW)
        .map(|entry| entry.message.as_str())
        .collect();
    recent.reverse();
    recent.join(CONTEXT_SEPARATOR)
}
