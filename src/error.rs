//! Error types for AI Fleet.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the fleet.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Fleet error: {0}")]
    Fleet(#[from] FleetError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Planner / stepper provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fleet orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("Fleet is busy orchestrating, try again shortly")]
    Busy,

    #[error("Directive is empty")]
    EmptyDirective,

    #[error("Worker {id} not found")]
    WorkerNotFound { id: Uuid },

    #[error("Worker {id} is {from}, cannot transition to {to}")]
    InvalidTransition { id: Uuid, from: String, to: String },
}

/// Result type alias for the fleet.
pub type Result<T> = std::result::Result<T, Error>;
