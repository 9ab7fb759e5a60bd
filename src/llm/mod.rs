//! Planning and stepping services.
//!
//! The fleet talks to the model through two narrow traits:
//! - **`Planner`**: turns a directive into a list of task specs
//! - **`Stepper`**: advances one worker by one turn, given its session
//!
//! `AnthropicClient` implements both over the Messages API.

pub mod anthropic;
pub mod prompts;

pub use anthropic::AnthropicClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LlmError;
use crate::worker::state::WorkerStatus;

/// Default model for planning and stepping.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Configuration for creating an LLM client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Read `ANTHROPIC_API_KEY` and `AI_FLEET_MODEL` from the environment.
    pub fn from_env() -> Result<Self, crate::error::ConfigError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            crate::error::ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string())
        })?;
        let model = std::env::var("AI_FLEET_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_key: secrecy::SecretString::from(api_key),
            model,
            max_tokens: 4096,
        })
    }
}

/// Chat role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in a worker's dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One unit of planned work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub role: String,
    pub task: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, role: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            task: task.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }
}

/// Planner output. Consumed once, not retained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub tasks: Vec<TaskSpec>,
}

/// Stepper session handle: the accumulated dialogue for one worker.
///
/// Never persisted. Rebuilt from the worker record on first use.
#[derive(Debug, Clone)]
pub struct StepSession {
    pub worker_id: Uuid,
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
}

impl StepSession {
    pub fn new(worker_id: Uuid, system_prompt: impl Into<String>) -> Self {
        Self {
            worker_id,
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
        }
    }

    /// Number of completed exchanges.
    pub fn turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count()
    }
}

/// A dependency resolved by name at turn time.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyStatus {
    pub name: String,
    /// None if no worker with that name exists.
    pub status: Option<WorkerStatus>,
}

/// Everything a stepper needs for one turn besides the session.
#[derive(Debug, Clone)]
pub struct StepRequest<'a> {
    pub worker_name: &'a str,
    pub shared_context: &'a str,
    pub task: &'a str,
    pub known_paths: &'a [String],
    pub dependencies: &'a [DependencyStatus],
}

/// Decomposes a directive into task specs.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, directive: &str) -> Result<Plan, LlmError>;
}

/// Advances one worker by one turn.
#[async_trait]
pub trait Stepper: Send + Sync {
    /// Run one turn. Implementations append the exchange to `session` on success.
    async fn step(
        &self,
        session: &mut StepSession,
        request: StepRequest<'_>,
    ) -> Result<String, LlmError>;
}
