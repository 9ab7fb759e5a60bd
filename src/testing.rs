//! Scripted planner/stepper doubles for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::FleetConfig;
use crate::error::LlmError;
use crate::llm::{ChatMessage, Plan, Planner, StepRequest, StepSession, Stepper, TaskSpec};
use crate::worker::orchestrator::{Orchestrator, OrchestratorDeps};
use crate::worker::state::WorkerStatus;

/// Reply used once a worker's script runs out.
pub const DEFAULT_REPLY: &str = "TASK_COMPLETE";

fn failure(reason: &str) -> LlmError {
    LlmError::RequestFailed {
        provider: "scripted".to_string(),
        reason: reason.to_string(),
    }
}

/// Planner that returns queued plans, then repeats the last one.
pub struct ScriptedPlanner {
    plans: Mutex<VecDeque<Result<Plan, String>>>,
    fallback: Result<Plan, String>,
    pub directives: Mutex<Vec<String>>,
}

impl ScriptedPlanner {
    /// Always plan one task per name.
    pub fn tasks(names: &[&str]) -> Self {
        Self::always(Ok(plan_of(names)))
    }

    /// Always fail.
    pub fn failing(reason: &str) -> Self {
        Self::always(Err(reason.to_string()))
    }

    fn always(result: Result<Plan, String>) -> Self {
        Self {
            plans: Mutex::new(VecDeque::new()),
            fallback: result,
            directives: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plan ahead of the standing answer.
    pub fn then(self, result: Result<Plan, &str>) -> Self {
        self.plans
            .lock()
            .unwrap()
            .push_back(result.map_err(str::to_string));
        self
    }
}

pub fn plan_of(names: &[&str]) -> Plan {
    Plan {
        tasks: names
            .iter()
            .map(|name| TaskSpec::new(*name, "engineer", format!("{name} task")))
            .collect(),
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, directive: &str) -> Result<Plan, LlmError> {
        self.directives.lock().unwrap().push(directive.to_string());
        let next = self.plans.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
            .map_err(|reason| failure(&reason))
    }
}

/// Stepper that answers from a per-worker-name script.
#[derive(Default)]
pub struct ScriptedStepper {
    replies: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    pub calls: Mutex<Vec<String>>,
    /// Shared context handed to each call, in order.
    pub contexts: Mutex<Vec<String>>,
}

impl ScriptedStepper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, worker: &str, text: &str) -> Self {
        self.push(worker, Ok(text.to_string()))
    }

    pub fn fail(self, worker: &str, reason: &str) -> Self {
        self.push(worker, Err(reason.to_string()))
    }

    fn push(self, worker: &str, result: Result<String, String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(worker.to_string())
            .or_default()
            .push_back(result);
        self
    }
}

#[async_trait]
impl Stepper for ScriptedStepper {
    async fn step(
        &self,
        session: &mut StepSession,
        request: StepRequest<'_>,
    ) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(request.worker_name.to_string());
        self.contexts
            .lock()
            .unwrap()
            .push(request.shared_context.to_string());
        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(request.worker_name)
            .and_then(VecDeque::pop_front);

        let text = next
            .unwrap_or_else(|| Ok(DEFAULT_REPLY.to_string()))
            .map_err(|reason| failure(&reason))?;
        session.messages.push(ChatMessage::user(request.task));
        session.messages.push(ChatMessage::assistant(text.clone()));
        Ok(text)
    }
}

pub fn orchestrator_with(planner: ScriptedPlanner, stepper: ScriptedStepper) -> Arc<Orchestrator> {
    orchestrator_with_config(FleetConfig::without_cooldown(), planner, stepper)
}

pub fn orchestrator_with_config(
    config: FleetConfig,
    planner: ScriptedPlanner,
    stepper: ScriptedStepper,
) -> Arc<Orchestrator> {
    Orchestrator::new(
        config,
        OrchestratorDeps {
            planner: Arc::new(planner),
            stepper: Arc::new(stepper),
            snapshots: None,
        },
    )
}

/// Like [`orchestrator_with`], keeping a handle on the stepper.
pub fn orchestrator_sharing(
    planner: ScriptedPlanner,
    stepper: Arc<ScriptedStepper>,
) -> Arc<Orchestrator> {
    Orchestrator::new(
        FleetConfig::without_cooldown(),
        OrchestratorDeps {
            planner: Arc::new(planner),
            stepper,
            snapshots: None,
        },
    )
}

/// Move an idle worker to `Working` the way the scheduler would.
pub async fn start_working(fleet: &Orchestrator, id: Uuid) {
    fleet
        .store
        .write()
        .await
        .update(id, |w| w.transition_to(WorkerStatus::Working))
        .unwrap()
        .unwrap();
}
