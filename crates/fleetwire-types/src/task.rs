use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scout-Plan-Build workflow phase. Ordered: Scout runs first, then Plan,
/// then Build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Scout,
    Plan,
    Build,
}

impl Phase {
    pub const ORDER: [Phase; 3] = [Phase::Scout, Phase::Plan, Phase::Build];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Scout => "SCOUT",
            Phase::Plan => "PLAN",
            Phase::Build => "BUILD",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// One node in a workflow's dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub task_id: String,
    pub agent_name: String,
    pub phase: Phase,
    pub spec: Value,
    pub depends_on: Vec<String>,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AgentTask {
    pub fn new(
        task_id: impl Into<String>,
        agent_name: impl Into<String>,
        phase: Phase,
        spec: Value,
        depends_on: Vec<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent_name: agent_name.into(),
            phase,
            spec,
            depends_on,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowStatus {
    Draft,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: String,
    pub tasks: Vec<AgentTask>,
    pub status: WorkflowStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn new(workflow_id: impl Into<String>, tasks: Vec<AgentTask>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            tasks,
            status: WorkflowStatus::Draft,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Per-task outcome as returned to the caller of the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub agent_name: String,
    pub status: TaskStatus,
    pub error: Option<String>,
}

/// Structured summary of one workflow execution (§7: "a failed workflow
/// returns a structured summary enumerating each task's final status").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub tasks: Vec<TaskOutcome>,
    pub degraded: bool,
}

/// Per-workflow execution record kept by the fleet tracker. Derived, not
/// authoritative — rebuilt entirely from the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecutionRecord {
    pub workflow_id: String,
    pub agent_name: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub tokens: Option<u64>,
    pub cost: Option<f64>,
}
