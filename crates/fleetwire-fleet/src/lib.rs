//! Fleet Tracker (C7): derives per-workflow execution state from the
//! event stream and computes bottleneck/parallelization analysis over it.
//! Everything here is derived, not authoritative — it can be rebuilt
//! entirely by replaying the event stream.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use fleetwire_core::event_bus::EventHandler;
use fleetwire_core::EventBus;
use fleetwire_types::{AgentExecutionRecord, Event, EventType, TaskStatus};

/// Per-workflow derived state.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowTrace {
    pub workflow_id: String,
    pub status: WorkflowTraceStatus,
    /// Insertion order of `agent.invoked` events.
    pub execution_order: Vec<String>,
    /// Agent names with an open `agent.invoked` not yet matched by a
    /// completion/failure event.
    pub running: HashSet<String>,
    pub records: Vec<AgentExecutionRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowTraceStatus {
    Active,
    Completed,
    Failed,
}

impl WorkflowTrace {
    fn new(workflow_id: &str) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            status: WorkflowTraceStatus::Active,
            execution_order: Vec::new(),
            running: HashSet::new(),
            records: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Total wall-clock span of the workflow so far, in milliseconds.
    pub fn wall_clock_ms(&self) -> u64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
            (Some(start), None) => (Utc::now() - start).num_milliseconds().max(0) as u64,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BottleneckReport {
    /// Agent names whose recorded duration exceeds 30% of the workflow's
    /// total agent duration.
    pub slow_agents: Vec<String>,
    pub parallelization_ratio: f64,
    /// `parallelization_ratio < 0.30`.
    pub sequential: bool,
}

/// Pure bottleneck analysis over a workflow's completed records (§4.6).
pub fn analyze_bottlenecks(records: &[AgentExecutionRecord], wall_clock_ms: u64) -> BottleneckReport {
    let total_duration: u64 = records.iter().filter_map(|r| r.duration_ms).sum();
    if total_duration == 0 {
        return BottleneckReport::default();
    }

    let slow_agents = records
        .iter()
        .filter_map(|record| {
            let duration = record.duration_ms?;
            if duration as f64 / total_duration as f64 > 0.30 {
                Some(record.agent_name.clone())
            } else {
                None
            }
        })
        .collect();

    let parallelization_ratio = 1.0 - (wall_clock_ms as f64 / total_duration as f64);
    BottleneckReport {
        slow_agents,
        parallelization_ratio,
        sequential: parallelization_ratio < 0.30,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentAggregate {
    pub count: u64,
    pub average_duration_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetStats {
    pub active_workflows: usize,
    pub completed_workflows: usize,
    pub failed_workflows: usize,
    pub per_agent: HashMap<String, AgentAggregate>,
    pub total_tokens: u64,
    pub total_cost: f64,
}

#[derive(Clone, Copy)]
struct OpenInvocation {
    started_at: DateTime<Utc>,
}

struct Inner {
    workflows: Mutex<HashMap<String, WorkflowTrace>>,
    // trace_id -> (workflow_id, agent_name, open invocation)
    open: Mutex<HashMap<String, (String, String, OpenInvocation)>>,
}

/// Subscribes to the lifecycle events it needs and maintains derived
/// per-workflow state in memory.
#[derive(Clone)]
pub struct FleetTracker {
    inner: Arc<Inner>,
}

impl FleetTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                workflows: Mutex::new(HashMap::new()),
                open: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Subscribes this tracker to the event types it needs from `bus`.
    pub fn install(self, bus: &EventBus) -> Self {
        bus.subscribe(
            EventType::WorkflowStarted,
            "fleetwire-fleet::workflow_started",
            Arc::new(self.clone()) as Arc<dyn EventHandler>,
        );
        bus.subscribe(
            EventType::WorkflowCompleted,
            "fleetwire-fleet::workflow_completed",
            Arc::new(self.clone()) as Arc<dyn EventHandler>,
        );
        bus.subscribe(
            EventType::WorkflowFailed,
            "fleetwire-fleet::workflow_failed",
            Arc::new(self.clone()) as Arc<dyn EventHandler>,
        );
        bus.subscribe(
            EventType::AgentInvoked,
            "fleetwire-fleet::agent_invoked",
            Arc::new(self.clone()) as Arc<dyn EventHandler>,
        );
        bus.subscribe(
            EventType::AgentCompleted,
            "fleetwire-fleet::agent_completed",
            Arc::new(self.clone()) as Arc<dyn EventHandler>,
        );
        bus.subscribe(
            EventType::AgentFailed,
            "fleetwire-fleet::agent_failed",
            Arc::new(self.clone()) as Arc<dyn EventHandler>,
        );
        self
    }

    pub fn workflow(&self, workflow_id: &str) -> Option<WorkflowTrace> {
        self.inner.workflows.lock().get(workflow_id).cloned()
    }

    pub fn bottlenecks(&self, workflow_id: &str) -> Option<BottleneckReport> {
        let workflows = self.inner.workflows.lock();
        let trace = workflows.get(workflow_id)?;
        Some(analyze_bottlenecks(&trace.records, trace.wall_clock_ms()))
    }

    pub fn stats(&self) -> FleetStats {
        let workflows = self.inner.workflows.lock();
        let mut stats = FleetStats::default();
        let mut agent_totals: HashMap<String, (u64, u64)> = HashMap::new();

        for trace in workflows.values() {
            match trace.status {
                WorkflowTraceStatus::Active => stats.active_workflows += 1,
                WorkflowTraceStatus::Completed => stats.completed_workflows += 1,
                WorkflowTraceStatus::Failed => stats.failed_workflows += 1,
            }
            for record in &trace.records {
                let entry = agent_totals.entry(record.agent_name.clone()).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += record.duration_ms.unwrap_or(0);
                if let Some(tokens) = record.tokens {
                    stats.total_tokens += tokens;
                }
                if let Some(cost) = record.cost {
                    stats.total_cost += cost;
                }
            }
        }

        stats.per_agent = agent_totals
            .into_iter()
            .map(|(name, (count, total_duration))| {
                let average_duration_ms = if count == 0 {
                    0.0
                } else {
                    total_duration as f64 / count as f64
                };
                (
                    name,
                    AgentAggregate {
                        count,
                        average_duration_ms,
                    },
                )
            })
            .collect();

        stats
    }

    fn on_workflow_started(&self, event: &Event) {
        let Some(workflow_id) = event.workflow_id() else {
            return;
        };
        let mut workflows = self.inner.workflows.lock();
        let trace = workflows
            .entry(workflow_id.to_string())
            .or_insert_with(|| WorkflowTrace::new(workflow_id));
        trace.started_at = Some(event.timestamp);
    }

    fn on_workflow_terminal(&self, event: &Event, status: WorkflowTraceStatus) {
        let Some(workflow_id) = event.workflow_id() else {
            return;
        };
        let mut workflows = self.inner.workflows.lock();
        let trace = workflows
            .entry(workflow_id.to_string())
            .or_insert_with(|| WorkflowTrace::new(workflow_id));
        trace.status = status;
        trace.finished_at = Some(event.timestamp);
    }

    fn on_agent_invoked(&self, event: &Event) {
        let Some(agent_name) = event.agent_name() else {
            return;
        };
        let workflow_id = event
            .payload
            .get("invoked_by")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        self.inner.open.lock().insert(
            event.trace_id.clone(),
            (
                workflow_id.to_string(),
                agent_name.to_string(),
                OpenInvocation {
                    started_at: event.timestamp,
                },
            ),
        );

        let mut workflows = self.inner.workflows.lock();
        let trace = workflows
            .entry(workflow_id.to_string())
            .or_insert_with(|| WorkflowTrace::new(workflow_id));
        trace.execution_order.push(agent_name.to_string());
        trace.running.insert(agent_name.to_string());
    }

    fn on_agent_terminal(&self, event: &Event, status: TaskStatus) {
        let Some((workflow_id, agent_name, open)) = self.inner.open.lock().remove(&event.trace_id)
        else {
            // No matching open invocation; nothing to correlate this close
            // event against, per the aggregator's tolerate-unmatched-close
            // precedent in the metrics component.
            return;
        };

        let duration_ms = event
            .payload
            .get("duration_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or_else(|| (event.timestamp - open.started_at).num_milliseconds().max(0) as u64);
        let tokens = event.payload.get("tokens").and_then(|v| v.as_u64());
        let cost = event.payload.get("cost").and_then(|v| v.as_f64());

        let mut workflows = self.inner.workflows.lock();
        let trace = workflows
            .entry(workflow_id.clone())
            .or_insert_with(|| WorkflowTrace::new(&workflow_id));
        trace.running.remove(&agent_name);
        trace.records.push(AgentExecutionRecord {
            workflow_id,
            agent_name,
            status,
            started_at: open.started_at,
            finished_at: Some(event.timestamp),
            duration_ms: Some(duration_ms),
            tokens,
            cost,
        });
    }
}

impl Default for FleetTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventHandler for FleetTracker {
    async fn handle(&self, event: Event) -> Result<(), String> {
        match event.event_type {
            EventType::WorkflowStarted => self.on_workflow_started(&event),
            EventType::WorkflowCompleted => {
                self.on_workflow_terminal(&event, WorkflowTraceStatus::Completed)
            }
            EventType::WorkflowFailed => {
                self.on_workflow_terminal(&event, WorkflowTraceStatus::Failed)
            }
            EventType::AgentInvoked => self.on_agent_invoked(&event),
            EventType::AgentCompleted => self.on_agent_terminal(&event, TaskStatus::Completed),
            EventType::AgentFailed => self.on_agent_terminal(&event, TaskStatus::Failed),
            _ => {}
        }
        Ok(())
    }
}
