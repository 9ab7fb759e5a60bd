//! Prompt construction and planner output parsing.

use crate::config::{DEFAULT_BROADCAST_PREFIX, DEFAULT_COMPLETION_TOKEN};
use crate::error::LlmError;
use crate::llm::{Plan, StepRequest};

/// System prompt for the planning call.
pub const PLANNER_SYSTEM_PROMPT: &str = "You are the lead architect of a small team of autonomous \
workers. Break the directive into 2 to 4 tasks. Respond with JSON only, shaped as \
{\"tasks\":[{\"name\":\"...\",\"role\":\"...\",\"task\":\"...\",\"dependencies\":[\"<other task name>\"]}]}. \
Names must be unique and short.";

/// System prompt for a worker session.
pub fn worker_system_prompt(name: &str, role: &str, task: &str) -> String {
    format!(
        "You are {name}, a {role} on an autonomous team.\n\
         Your assignment: {task}\n\n\
         Work in small steps. To write a file, wrap it as \
         <file path=\"relative/path.ext\">contents</file>. \
         To tell the rest of the team something important, start your reply with \
         {DEFAULT_BROADCAST_PREFIX}. When your assignment is fully done, include \
         {DEFAULT_COMPLETION_TOKEN} in your reply."
    )
}

/// User message for one turn.
pub fn step_prompt(request: &StepRequest<'_>) -> String {
    let mut prompt = format!("Current task: {}\n", request.task);

    if !request.shared_context.is_empty() {
        prompt.push_str("\nRecent team activity:\n");
        prompt.push_str(request.shared_context);
        prompt.push('\n');
    }

    if !request.dependencies.is_empty() {
        prompt.push_str("\nDependencies:\n");
        for dep in request.dependencies {
            let status = dep
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            prompt.push_str(&format!("- {}: {status}\n", dep.name));
        }
    }

    if request.known_paths.is_empty() {
        prompt.push_str("\nNo files exist yet.\n");
    } else {
        prompt.push_str("\nExisting files:\n");
        for path in request.known_paths {
            prompt.push_str(&format!("- {path}\n"));
        }
    }

    prompt.push_str("\nTake the next step.");
    prompt
}

/// Parse planner text into a plan. Accepts prose or code fences around the JSON.
pub fn parse_plan(provider: &str, text: &str) -> Result<Plan, LlmError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &text[s..=e],
        _ => {
            return Err(LlmError::InvalidResponse {
                provider: provider.to_string(),
                reason: "planner response contained no JSON object".to_string(),
            });
        }
    };

    let plan: Plan = serde_json::from_str(json)?;
    let tasks: Vec<_> = plan
        .tasks
        .into_iter()
        .filter(|t| !t.name.trim().is_empty())
        .collect();

    if tasks.is_empty() {
        return Err(LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: "planner returned no tasks".to_string(),
        });
    }

    Ok(Plan { tasks })
}
