//! Agent Coordinator (C6): phase-ordered execution of a workflow's task
//! DAG with intra-phase fan-out, dependency gating, cascade cancellation,
//! and cooperative workflow-level cancellation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fleetwire_core::EventBus;
use fleetwire_types::{
    payload, AgentTask, CoordinatorConfig, Event, EventType, FleetwireError, FleetwireResult,
    Phase, TaskOutcome, TaskStatus, Workflow, WorkflowOutcome, WorkflowStatus,
};

use crate::dag;
use crate::registry::AgentRegistry;

/// Cumulative and point-in-time counters exposed to callers that want a
/// health/status snapshot without reaching into the running-workflows map.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CoordinatorStats {
    pub workflows_started: u64,
    pub workflows_completed: u64,
    pub workflows_failed: u64,
    pub workflows_cancelled: u64,
    pub active_workflows: u64,
}

#[derive(Default)]
struct Counters {
    workflows_started: AtomicU64,
    workflows_completed: AtomicU64,
    workflows_failed: AtomicU64,
    workflows_cancelled: AtomicU64,
    active_workflows: AtomicU64,
}

/// Executes workflows submitted to it. One `Coordinator` instance is shared
/// by every workflow run in a process; per-workflow state lives only for
/// the lifetime of `execute`, except the cancellation-token map, which
/// tracks in-flight runs so `cancel` can reach them.
pub struct Coordinator {
    bus: EventBus,
    registry: AgentRegistry,
    config: CoordinatorConfig,
    running: AsyncMutex<HashMap<String, CancellationToken>>,
    counters: Counters,
}

impl Coordinator {
    pub fn new(bus: EventBus, registry: AgentRegistry, config: CoordinatorConfig) -> Self {
        Self {
            bus,
            registry,
            config,
            running: AsyncMutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Cumulative workflow counters plus the number currently in flight.
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            workflows_started: self.counters.workflows_started.load(Ordering::Relaxed),
            workflows_completed: self.counters.workflows_completed.load(Ordering::Relaxed),
            workflows_failed: self.counters.workflows_failed.load(Ordering::Relaxed),
            workflows_cancelled: self.counters.workflows_cancelled.load(Ordering::Relaxed),
            active_workflows: self.counters.active_workflows.load(Ordering::Relaxed),
        }
    }

    /// Requests cooperative cancellation of a running workflow. Returns
    /// `false` if no workflow with that id is currently running.
    pub async fn cancel(&self, workflow_id: &str) -> bool {
        match self.running.lock().await.get(workflow_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Validates the workflow's dependency graph, then executes it phase
    /// by phase (SCOUT, PLAN, BUILD), fanning tasks with satisfied
    /// dependencies out concurrently within each phase, bounded by
    /// `max_parallel`.
    pub async fn execute(
        &self,
        workflow: Workflow,
        session_id: &str,
    ) -> FleetwireResult<WorkflowOutcome> {
        dag::validate(&workflow.tasks)?;

        let workflow_id = workflow.workflow_id.clone();
        let cancel_token = CancellationToken::new();
        self.running
            .lock()
            .await
            .insert(workflow_id.clone(), cancel_token.clone());
        self.counters.workflows_started.fetch_add(1, Ordering::Relaxed);
        self.counters.active_workflows.fetch_add(1, Ordering::Relaxed);

        let tasks: HashMap<String, AgentTask> = workflow
            .tasks
            .into_iter()
            .map(|task| (task.task_id.clone(), task))
            .collect();
        let state = Arc::new(AsyncMutex::new(tasks));
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));

        self.publish(
            EventType::WorkflowStarted,
            session_id,
            &workflow_id,
            payload::workflow(&workflow_id, state.lock().await.len(), None),
        );

        for phase in Phase::ORDER {
            self.publish(
                EventType::PhaseStarted,
                session_id,
                &workflow_id,
                payload::phase(&workflow_id, phase.as_str()),
            );
            self.run_phase(
                phase,
                &workflow_id,
                session_id,
                &state,
                &semaphore,
                &cancel_token,
            )
            .await;
            self.publish(
                EventType::PhaseCompleted,
                session_id,
                &workflow_id,
                payload::phase(&workflow_id, phase.as_str()),
            );
        }

        self.running.lock().await.remove(&workflow_id);
        self.counters.active_workflows.fetch_sub(1, Ordering::Relaxed);

        let final_tasks = state.lock().await;
        let outcome = summarize(&workflow_id, &final_tasks);
        let result_event = payload::workflow(
            &workflow_id,
            final_tasks.len(),
            Some(serde_json::to_value(&outcome).unwrap_or(Value::Null)),
        );
        let event_type = if outcome.status == WorkflowStatus::Completed {
            EventType::WorkflowCompleted
        } else {
            EventType::WorkflowFailed
        };
        match outcome.status {
            WorkflowStatus::Completed => {
                self.counters.workflows_completed.fetch_add(1, Ordering::Relaxed);
            }
            WorkflowStatus::Cancelled => {
                self.counters.workflows_cancelled.fetch_add(1, Ordering::Relaxed);
            }
            WorkflowStatus::Failed => {
                self.counters.workflows_failed.fetch_add(1, Ordering::Relaxed);
            }
            WorkflowStatus::Draft | WorkflowStatus::Running => {}
        }
        self.publish(event_type, session_id, &workflow_id, result_event);

        Ok(outcome)
    }

    async fn run_phase(
        &self,
        phase: Phase,
        workflow_id: &str,
        session_id: &str,
        state: &Arc<AsyncMutex<HashMap<String, AgentTask>>>,
        semaphore: &Arc<Semaphore>,
        cancel_token: &CancellationToken,
    ) {
        loop {
            let (ready, cancelled_now, pending_remain) = {
                let mut tasks = state.lock().await;
                let statuses: HashMap<String, TaskStatus> = tasks
                    .iter()
                    .map(|(id, task)| (id.clone(), task.status))
                    .collect();

                let mut ready = Vec::new();
                let mut cancelled_now = Vec::new();
                let mut pending_remain = false;

                for task in tasks.values_mut() {
                    if task.phase != phase || task.status != TaskStatus::Pending {
                        continue;
                    }
                    if cancel_token.is_cancelled() {
                        task.status = TaskStatus::Cancelled;
                        task.finished_at = Some(chrono::Utc::now());
                        cancelled_now.push(task.task_id.clone());
                        continue;
                    }
                    let blocked_by_failure = task.depends_on.iter().any(|dep| {
                        matches!(
                            statuses.get(dep),
                            Some(TaskStatus::Failed) | Some(TaskStatus::Cancelled)
                        )
                    });
                    if blocked_by_failure {
                        task.status = TaskStatus::Cancelled;
                        task.finished_at = Some(chrono::Utc::now());
                        cancelled_now.push(task.task_id.clone());
                        continue;
                    }
                    let all_deps_completed = task
                        .depends_on
                        .iter()
                        .all(|dep| statuses.get(dep) == Some(&TaskStatus::Completed));
                    if all_deps_completed {
                        ready.push(task.task_id.clone());
                    } else {
                        pending_remain = true;
                    }
                }
                (ready, cancelled_now, pending_remain)
            };

            for task_id in &cancelled_now {
                warn!(workflow_id, task_id, "task cascade-cancelled");
            }

            if ready.is_empty() {
                if !pending_remain {
                    break;
                }
                // Dependencies live in an earlier, already-finished phase;
                // nothing here can still become ready this round.
                if cancelled_now.is_empty() {
                    break;
                }
                continue;
            }

            let mut handles = Vec::with_capacity(ready.len());
            for task_id in ready {
                let permit = semaphore.clone().acquire_owned().await.expect("semaphore open");
                let state = state.clone();
                let bus = self.bus.clone();
                let registry = self.registry.clone();
                let session_id = session_id.to_string();
                let workflow_id = workflow_id.to_string();
                let cancel_token = cancel_token.clone();
                let task_timeout_ms = self.config.task_timeout_ms;

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    run_task(
                        &task_id,
                        &state,
                        &bus,
                        &registry,
                        &session_id,
                        &workflow_id,
                        cancel_token,
                        task_timeout_ms,
                    )
                    .await;
                }));
            }
            for handle in handles {
                if let Err(err) = handle.await {
                    warn!(workflow_id, error = %err, "task worker panicked");
                }
            }
        }
    }

    fn publish(&self, event_type: EventType, session_id: &str, trace_id: &str, payload: Value) {
        match Event::new(event_type, session_id, trace_id, payload) {
            Ok(event) => self.bus.publish(event),
            Err(err) => warn!(error = %err, "failed to construct coordinator event"),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_task(
    task_id: &str,
    state: &Arc<AsyncMutex<HashMap<String, AgentTask>>>,
    bus: &EventBus,
    registry: &AgentRegistry,
    session_id: &str,
    workflow_id: &str,
    cancel_token: CancellationToken,
    task_timeout_ms: Option<u64>,
) {
    let (agent_name, spec, predecessors, trace_id) = {
        let mut tasks = state.lock().await;
        let predecessors: HashMap<String, Value> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| (t.task_id.clone(), t.result.clone().unwrap_or(Value::Null)))
            .collect();
        let task = tasks.get_mut(task_id).expect("task present");
        task.status = TaskStatus::Running;
        task.started_at = Some(chrono::Utc::now());
        (
            task.agent_name.clone(),
            task.spec.clone(),
            predecessors,
            format!("{workflow_id}:{task_id}"),
        )
    };

    let task_type = spec.get("task_type").and_then(Value::as_str);
    let files: Vec<String> = spec
        .get("files")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let context_tokens = spec.get("context_tokens").and_then(Value::as_u64);

    publish(
        bus,
        EventType::AgentInvoked,
        session_id,
        &trace_id,
        payload::agent_invoked(
            &agent_name,
            task_type,
            context_tokens,
            &files,
            Some(workflow_id),
            None,
        ),
    );

    let handler = match registry.get(&agent_name) {
        Ok(handler) => handler,
        Err(FleetwireError::UnknownAgent(name)) => {
            finish_task(
                state,
                task_id,
                bus,
                session_id,
                &trace_id,
                TaskStatus::Failed,
                None,
                Some(format!("unknown agent `{name}`")),
            )
            .await;
            return;
        }
        Err(_) => unreachable!("registry lookup only returns UnknownAgent"),
    };

    let start = tokio::time::Instant::now();
    let snapshot_task = {
        let tasks = state.lock().await;
        tasks.get(task_id).cloned().expect("task present")
    };

    let run_future = handler.run(&snapshot_task, &predecessors, cancel_token.clone());
    let mut timed_out = false;
    let outcome = match task_timeout_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), run_future).await {
            Ok(result) => result,
            Err(_) => {
                cancel_token.cancel();
                timed_out = true;
                Err(FleetwireError::Timeout {
                    task_id: task_id.to_string(),
                    elapsed_ms: ms,
                }
                .to_string())
            }
        },
        None => run_future.await,
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(result) => {
            let tokens = result.get("tokens").and_then(Value::as_u64);
            let cost = result.get("cost").and_then(Value::as_f64);
            let model = result.get("model").and_then(Value::as_str).map(str::to_string);
            finish_task(
                state,
                task_id,
                bus,
                session_id,
                &trace_id,
                TaskStatus::Completed,
                Some(result),
                None,
            )
            .await;
            publish(
                bus,
                EventType::AgentCompleted,
                session_id,
                &trace_id,
                payload::agent_completed(&agent_name, duration_ms, tokens, cost, model.as_deref()),
            );
        }
        Err(message) => {
            info!(workflow_id, task_id, error = %message, "agent task failed");
            finish_task(
                state,
                task_id,
                bus,
                session_id,
                &trace_id,
                TaskStatus::Failed,
                None,
                Some(message.clone()),
            )
            .await;
            let error_kind = if timed_out { "Timeout" } else { "TaskFailure" };
            publish(
                bus,
                EventType::AgentFailed,
                session_id,
                &trace_id,
                payload::agent_failed(&agent_name, error_kind, &message, duration_ms, None),
            );
        }
    }
}

async fn finish_task(
    state: &Arc<AsyncMutex<HashMap<String, AgentTask>>>,
    task_id: &str,
    _bus: &EventBus,
    _session_id: &str,
    _trace_id: &str,
    status: TaskStatus,
    result: Option<Value>,
    error: Option<String>,
) {
    let mut tasks = state.lock().await;
    if let Some(task) = tasks.get_mut(task_id) {
        task.status = status;
        task.result = result;
        task.error = error;
        task.finished_at = Some(chrono::Utc::now());
    }
}

fn publish(bus: &EventBus, event_type: EventType, session_id: &str, trace_id: &str, payload: Value) {
    match Event::new(event_type, session_id, trace_id, payload) {
        Ok(event) => bus.publish(event),
        Err(err) => warn!(error = %err, "failed to construct coordinator event"),
    }
}

fn summarize(workflow_id: &str, tasks: &HashMap<String, AgentTask>) -> WorkflowOutcome {
    let mut task_outcomes: Vec<TaskOutcome> = tasks
        .values()
        .map(|task| TaskOutcome {
            task_id: task.task_id.clone(),
            agent_name: task.agent_name.clone(),
            status: task.status,
            error: task.error.clone(),
        })
        .collect();
    task_outcomes.sort_by(|a, b| a.task_id.cmp(&b.task_id));

    let statuses: HashSet<TaskStatus> = tasks.values().map(|t| t.status).collect();
    let status = if statuses.contains(&TaskStatus::Failed) {
        WorkflowStatus::Failed
    } else if statuses.contains(&TaskStatus::Cancelled) {
        WorkflowStatus::Cancelled
    } else {
        WorkflowStatus::Completed
    };

    WorkflowOutcome {
        workflow_id: workflow_id.to_string(),
        status,
        tasks: task_outcomes,
        degraded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Instant;

    struct Recorder {
        order: Arc<AsyncMutex<Vec<String>>>,
        delay_ms: u64,
        fail: bool,
    }

    #[async_trait]
    impl crate::registry::AgentHandler for Recorder {
        async fn run(
            &self,
            task: &AgentTask,
            _predecessors: &HashMap<String, Value>,
            _cancel: CancellationToken,
        ) -> Result<Value, String> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.order.lock().await.push(task.task_id.clone());
            if self.fail {
                return Err("boom".to_string());
            }
            Ok(json!({ "ok": true }))
        }
    }

    fn task(id: &str, phase: Phase, depends_on: &[&str]) -> AgentTask {
        AgentTask::new(
            id,
            "worker",
            phase,
            json!({}),
            depends_on.iter().map(|d| d.to_string()).collect(),
        )
    }

    fn coordinator(order: Arc<AsyncMutex<Vec<String>>>, max_parallel: usize, fail: bool) -> Coordinator {
        let mut registry = AgentRegistry::new();
        registry.register(
            "worker",
            Arc::new(Recorder {
                order,
                delay_ms: 10,
                fail,
            }),
        );
        Coordinator::new(
            EventBus::new(),
            registry,
            CoordinatorConfig {
                max_parallel,
                task_timeout_ms: None,
            },
        )
    }

    #[tokio::test]
    async fn stats_track_completed_and_failed_workflows() {
        let order = Arc::new(AsyncMutex::new(Vec::new()));
        let ok_coordinator = coordinator(order.clone(), 4, false);
        ok_coordinator
            .execute(Workflow::new("wf-ok", vec![task("a", Phase::Scout, &[])]), "session-1")
            .await
            .unwrap();
        let stats = ok_coordinator.stats();
        assert_eq!(stats.workflows_started, 1);
        assert_eq!(stats.workflows_completed, 1);
        assert_eq!(stats.workflows_failed, 0);
        assert_eq!(stats.active_workflows, 0);

        let failing_coordinator = coordinator(Arc::new(AsyncMutex::new(Vec::new())), 4, true);
        failing_coordinator
            .execute(Workflow::new("wf-bad", vec![task("a", Phase::Scout, &[])]), "session-1")
            .await
            .unwrap();
        assert_eq!(failing_coordinator.stats().workflows_failed, 1);
    }

    #[tokio::test]
    async fn s5_sequential_scout_plan_build_runs_in_order() {
        let order = Arc::new(AsyncMutex::new(Vec::new()));
        let coordinator = coordinator(order.clone(), 4, false);
        let workflow = Workflow::new(
            "wf-1",
            vec![
                task("scout_1", Phase::Scout, &[]),
                task("plan_1", Phase::Plan, &["scout_1"]),
                task("build_1", Phase::Build, &["plan_1"]),
            ],
        );
        let outcome = coordinator.execute(workflow, "session-1").await.unwrap();
        assert_eq!(outcome.status, WorkflowStatus::Completed);
        assert_eq!(
            *order.lock().await,
            vec!["scout_1".to_string(), "plan_1".to_string(), "build_1".to_string()]
        );
    }

    #[tokio::test]
    async fn s6_independent_scouts_fan_out_concurrently() {
        let order = Arc::new(AsyncMutex::new(Vec::new()));
        let coordinator = coordinator(order.clone(), 4, false);
        let workflow = Workflow::new(
            "wf-2",
            vec![
                task("scout_a", Phase::Scout, &[]),
                task("scout_b", Phase::Scout, &[]),
                task("plan", Phase::Plan, &["scout_a", "scout_b"]),
                task("build", Phase::Build, &["plan"]),
            ],
        );
        let started = Instant::now();
        let outcome = coordinator.execute(workflow, "session-1").await.unwrap();
        assert_eq!(outcome.status, WorkflowStatus::Completed);
        // Two 10ms scouts run in parallel, then plan, then build: well under
        // the 40ms a fully sequential run of four tasks would need.
        assert!(started.elapsed() < Duration::from_millis(35));
    }

    #[tokio::test]
    async fn s7_cycle_rejected_before_any_invocation() {
        let order = Arc::new(AsyncMutex::new(Vec::new()));
        let coordinator = coordinator(order.clone(), 4, false);
        let workflow = Workflow::new(
            "wf-3",
            vec![
                task("a", Phase::Scout, &["b"]),
                task("b", Phase::Scout, &["a"]),
            ],
        );
        let err = coordinator.execute(workflow, "session-1").await.unwrap_err();
        assert!(matches!(err, FleetwireError::CircularDependency { .. }));
        assert!(order.lock().await.is_empty());
    }

    #[tokio::test]
    async fn cascade_cancellation_skips_downstream_without_invoking_handler() {
        let order = Arc::new(AsyncMutex::new(Vec::new()));
        let coordinator = coordinator(order.clone(), 4, true);
        let workflow = Workflow::new(
            "wf-4",
            vec![
                task("scout_1", Phase::Scout, &[]),
                task("plan_1", Phase::Plan, &["scout_1"]),
            ],
        );
        let outcome = coordinator.execute(workflow, "session-1").await.unwrap();
        assert_eq!(outcome.status, WorkflowStatus::Failed);
        let plan = outcome.tasks.iter().find(|t| t.task_id == "plan_1").unwrap();
        assert_eq!(plan.status, TaskStatus::Cancelled);
        assert_eq!(*order.lock().await, vec!["scout_1".to_string()]);
    }

    #[tokio::test]
    async fn unknown_agent_fails_the_task() {
        let registry = AgentRegistry::new();
        let coordinator = Coordinator::new(
            EventBus::new(),
            registry,
            CoordinatorConfig {
                max_parallel: 2,
                task_timeout_ms: None,
            },
        );
        let workflow = Workflow::new(
            "wf-5",
            vec![AgentTask::new("a", "ghost", Phase::Scout, json!({}), vec![])],
        );
        let outcome = coordinator.execute(workflow, "session-1").await.unwrap();
        assert_eq!(outcome.status, WorkflowStatus::Failed);
        assert!(outcome.tasks[0].error.as_deref().unwrap().contains("unknown agent"));
    }

    #[tokio::test]
    async fn cancel_stops_not_yet_started_tasks() {
        static CALLS: AtomicU64 = AtomicU64::new(0);
        struct Slow;
        #[async_trait]
        impl crate::registry::AgentHandler for Slow {
            async fn run(
                &self,
                _task: &AgentTask,
                _predecessors: &HashMap<String, Value>,
                _cancel: CancellationToken,
            ) -> Result<Value, String> {
                CALLS.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(json!({}))
            }
        }
        let mut registry = AgentRegistry::new();
        registry.register("worker", Arc::new(Slow));
        let coordinator = Arc::new(Coordinator::new(
            EventBus::new(),
            registry,
            CoordinatorConfig {
                max_parallel: 1,
                task_timeout_ms: None,
            },
        ));
        let workflow = Workflow::new(
            "wf-6",
            vec![
                task("a", Phase::Scout, &[]),
                task("b", Phase::Scout, &[]),
                task("c", Phase::Scout, &[]),
            ],
        );
        let coordinator_clone = coordinator.clone();
        let run = tokio::spawn(async move { coordinator_clone.execute(workflow, "s").await.unwrap() });
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.cancel("wf-6").await;
        let outcome = run.await.unwrap();
        assert_eq!(outcome.status, WorkflowStatus::Cancelled);
        assert!(CALLS.load(Ordering::SeqCst) < 3);
    }

    #[tokio::test]
    async fn task_exceeding_its_deadline_fails_with_timeout_not_task_failure() {
        struct Forever;
        #[async_trait]
        impl crate::registry::AgentHandler for Forever {
            async fn run(
                &self,
                _task: &AgentTask,
                _predecessors: &HashMap<String, Value>,
                _cancel: CancellationToken,
            ) -> Result<Value, String> {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(json!({}))
            }
        }
        let mut registry = AgentRegistry::new();
        registry.register("worker", Arc::new(Forever));
        let bus = EventBus::new();
        let failed = Arc::new(AsyncMutex::new(Vec::new()));
        struct Capture(Arc<AsyncMutex<Vec<Value>>>);
        #[async_trait]
        impl fleetwire_core::event_bus::EventHandler for Capture {
            async fn handle(&self, event: Event) -> Result<(), String> {
                self.0.lock().await.push(event.payload);
                Ok(())
            }
        }
        bus.subscribe(
            EventType::AgentFailed,
            "capture",
            Arc::new(Capture(failed.clone())),
        );
        let coordinator = Coordinator::new(
            bus,
            registry,
            CoordinatorConfig {
                max_parallel: 1,
                task_timeout_ms: Some(10),
            },
        );
        let workflow = Workflow::new("wf-7", vec![task("a", Phase::Scout, &[])]);
        let outcome = coordinator.execute(workflow, "session-1").await.unwrap();
        assert_eq!(outcome.status, WorkflowStatus::Failed);
        let failed_task = &outcome.tasks[0];
        assert_eq!(failed_task.status, TaskStatus::Failed);
        assert!(failed_task.error.as_deref().unwrap().contains("timed out"));

        // bus.publish is fire-and-forget; give the handler's worker task a
        // moment to drain before asserting on what it captured.
        let mut payloads = Vec::new();
        for _ in 0..20 {
            payloads = failed.lock().await.clone();
            if !payloads.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["error"]["kind"], json!("Timeout"));
    }
}
