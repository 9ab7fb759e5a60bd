//! AI Fleet — a planner-driven team of autonomous workers.

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;
