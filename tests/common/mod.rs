//! Stub planner/stepper shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use ai_fleet::config::FleetConfig;
use ai_fleet::error::{DatabaseError, LlmError};
use ai_fleet::llm::{ChatMessage, Plan, Planner, StepRequest, StepSession, Stepper, TaskSpec};
use ai_fleet::store::{FleetSnapshot, MemorySnapshotStore, SnapshotStore};
use ai_fleet::worker::{Orchestrator, OrchestratorDeps};

/// Maximum time any test is allowed to run before we consider it hung.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn stub_failure(reason: &str) -> LlmError {
    LlmError::RequestFailed {
        provider: "stub".to_string(),
        reason: reason.to_string(),
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

/// Planner that returns queued answers, then a standing answer.
pub struct StubPlanner {
    queued: Mutex<VecDeque<Result<Plan, String>>>,
    standing: Result<Plan, String>,
    /// When set, each call waits for a permit before answering.
    pub gate: Option<Arc<Notify>>,
    pub calls: AtomicUsize,
}

impl StubPlanner {
    pub fn tasks(names: &[&str]) -> Self {
        Self::standing(Ok(plan_of(names)))
    }

    pub fn failing(reason: &str) -> Self {
        Self::standing(Err(reason.to_string()))
    }

    fn standing(standing: Result<Plan, String>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            standing,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn then(self, answer: Result<Plan, &str>) -> Self {
        self.queued
            .lock()
            .unwrap()
            .push_back(answer.map_err(str::to_string));
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl Planner for StubPlanner {
    async fn plan(&self, _directive: &str) -> Result<Plan, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.queued.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.standing.clone())
            .map_err(|reason| stub_failure(&reason))
    }
}

/// Stepper answering from a per-worker-name script.
///
/// Unscripted turns reply with the completion token.
#[derive(Default)]
pub struct StubStepper {
    replies: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    /// Permanent failures by worker name.
    always_fail: Mutex<HashMap<String, String>>,
    /// Signalled when a step call starts.
    pub entered: Arc<Notify>,
    /// When set, each call waits for a permit before answering.
    pub release: Option<Arc<Notify>>,
    /// Artificial latency per call.
    pub latency: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl StubStepper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, worker: &str, text: &str) -> Self {
        self.push(worker, Ok(text.to_string()))
    }

    pub fn fail(self, worker: &str, reason: &str) -> Self {
        self.push(worker, Err(reason.to_string()))
    }

    pub fn always_fail(self, worker: &str, reason: &str) -> Self {
        self.always_fail
            .lock()
            .unwrap()
            .insert(worker.to_string(), reason.to_string());
        self
    }

    pub fn gated(mut self, release: Arc<Notify>) -> Self {
        self.release = Some(release);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
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
impl Stepper for StubStepper {
    async fn step(
        &self,
        session: &mut StepSession,
        request: StepRequest<'_>,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.entered.notify_one();

        if let Some(release) = &self.release {
            release.notified().await;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let permanent = self
            .always_fail
            .lock()
            .unwrap()
            .get(request.worker_name)
            .cloned();
        if let Some(reason) = permanent {
            return Err(stub_failure(&reason));
        }

        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(request.worker_name)
            .and_then(VecDeque::pop_front);
        let text = next
            .unwrap_or_else(|| Ok("TASK_COMPLETE".to_string()))
            .map_err(|reason| stub_failure(&reason))?;

        session.messages.push(ChatMessage::user(request.task));
        session.messages.push(ChatMessage::assistant(text.clone()));
        Ok(text)
    }
}

/// In-memory snapshot store whose next save can be held open.
#[derive(Default)]
pub struct GatedSnapshotStore {
    inner: MemorySnapshotStore,
    armed: AtomicBool,
    /// Signalled when a held save starts.
    pub entered: Arc<Notify>,
    /// Lets a held save finish.
    pub release: Arc<Notify>,
    pub saves: AtomicUsize,
}

impl GatedSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the next save until `release` is notified.
    pub fn hold_next_save(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SnapshotStore for GatedSnapshotStore {
    async fn load(&self) -> Result<Option<FleetSnapshot>, DatabaseError> {
        self.inner.load().await
    }

    async fn save(&self, snapshot: &FleetSnapshot) -> Result<(), DatabaseError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.save(snapshot).await
    }

    async fn clear(&self) -> Result<(), DatabaseError> {
        self.inner.clear().await
    }
}

/// Orchestrator with zero cool-down and no persistence.
pub fn fleet(planner: StubPlanner, stepper: StubStepper) -> Arc<Orchestrator> {
    fleet_with(Arc::new(planner), Arc::new(stepper), None)
}

pub fn fleet_with(
    planner: Arc<StubPlanner>,
    stepper: Arc<StubStepper>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
) -> Arc<Orchestrator> {
    Orchestrator::new(
        FleetConfig::without_cooldown(),
        OrchestratorDeps {
            planner,
            stepper,
            snapshots,
        },
    )
}
