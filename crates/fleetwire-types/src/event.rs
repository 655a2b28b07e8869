use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::FleetwireError;

/// The closed catalog of event names (§6). Versioned as `v1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "agent.invoked")]
    AgentInvoked,
    #[serde(rename = "agent.completed")]
    AgentCompleted,
    #[serde(rename = "agent.failed")]
    AgentFailed,
    #[serde(rename = "tool.invoked")]
    ToolInvoked,
    #[serde(rename = "tool.completed")]
    ToolCompleted,
    #[serde(rename = "tool.failed")]
    ToolFailed,
    #[serde(rename = "workflow.started")]
    WorkflowStarted,
    #[serde(rename = "workflow.completed")]
    WorkflowCompleted,
    #[serde(rename = "workflow.failed")]
    WorkflowFailed,
    #[serde(rename = "phase.started")]
    PhaseStarted,
    #[serde(rename = "phase.completed")]
    PhaseCompleted,
    #[serde(rename = "model.selected")]
    ModelSelected,
    #[serde(rename = "model.tier_upgraded")]
    ModelTierUpgraded,
    #[serde(rename = "model.degraded")]
    ModelDegraded,
    #[serde(rename = "cost.recorded")]
    CostRecorded,
    #[serde(rename = "cost.budget_warning")]
    CostBudgetWarning,
    #[serde(rename = "cost.budget_exceeded")]
    CostBudgetExceeded,
    #[serde(rename = "snapshot.created")]
    SnapshotCreated,
    #[serde(rename = "snapshot.restored")]
    SnapshotRestored,
    #[serde(rename = "session.started")]
    SessionStarted,
    #[serde(rename = "session.ended")]
    SessionEnded,
    #[serde(rename = "session.token_warning")]
    SessionTokenWarning,
    #[serde(rename = "error.raised")]
    ErrorRaised,
    #[serde(rename = "error.recovered")]
    ErrorRecovered,
}

impl EventType {
    pub const ALL: &'static [EventType] = &[
        EventType::AgentInvoked,
        EventType::AgentCompleted,
        EventType::AgentFailed,
        EventType::ToolInvoked,
        EventType::ToolCompleted,
        EventType::ToolFailed,
        EventType::WorkflowStarted,
        EventType::WorkflowCompleted,
        EventType::WorkflowFailed,
        EventType::PhaseStarted,
        EventType::PhaseCompleted,
        EventType::ModelSelected,
        EventType::ModelTierUpgraded,
        EventType::ModelDegraded,
        EventType::CostRecorded,
        EventType::CostBudgetWarning,
        EventType::CostBudgetExceeded,
        EventType::SnapshotCreated,
        EventType::SnapshotRestored,
        EventType::SessionStarted,
        EventType::SessionEnded,
        EventType::SessionTokenWarning,
        EventType::ErrorRaised,
        EventType::ErrorRecovered,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::AgentInvoked => "agent.invoked",
            EventType::AgentCompleted => "agent.completed",
            EventType::AgentFailed => "agent.failed",
            EventType::ToolInvoked => "tool.invoked",
            EventType::ToolCompleted => "tool.completed",
            EventType::ToolFailed => "tool.failed",
            EventType::WorkflowStarted => "workflow.started",
            EventType::WorkflowCompleted => "workflow.completed",
            EventType::WorkflowFailed => "workflow.failed",
            EventType::PhaseStarted => "phase.started",
            EventType::PhaseCompleted => "phase.completed",
            EventType::ModelSelected => "model.selected",
            EventType::ModelTierUpgraded => "model.tier_upgraded",
            EventType::ModelDegraded => "model.degraded",
            EventType::CostRecorded => "cost.recorded",
            EventType::CostBudgetWarning => "cost.budget_warning",
            EventType::CostBudgetExceeded => "cost.budget_exceeded",
            EventType::SnapshotCreated => "snapshot.created",
            EventType::SnapshotRestored => "snapshot.restored",
            EventType::SessionStarted => "session.started",
            EventType::SessionEnded => "session.ended",
            EventType::SessionTokenWarning => "session.token_warning",
            EventType::ErrorRaised => "error.raised",
            EventType::ErrorRecovered => "error.recovered",
        }
    }

    pub fn is_agent_lifecycle(self) -> bool {
        matches!(
            self,
            EventType::AgentInvoked | EventType::AgentCompleted | EventType::AgentFailed
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = FleetwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| FleetwireError::InvalidEvent(format!("unknown event type `{s}`")))
    }
}

/// An immutable, published fact on the Event Bus.
///
/// Every field is populated at construction and never mutated afterward;
/// the constructor is the only way to produce one, and it validates the
/// identity fields the wire protocol and metrics aggregator depend on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
    pub trace_id: String,
    pub session_id: String,
}

impl Event {
    /// Constructs a new event. Fails with `InvalidEvent` if `session_id` is
    /// empty (§4.1: "empty `event_type` or `session_id`" are the only
    /// publishable-ness checks the spec mandates). `trace_id` is not
    /// validated here — callers may legitimately reuse caller-supplied
    /// identifiers such as a `workflow_id` as the `trace_id`, and rejecting
    /// those at construction would make failures surface far from their
    /// cause.
    pub fn new(
        event_type: EventType,
        session_id: impl Into<String>,
        trace_id: impl Into<String>,
        payload: Value,
    ) -> Result<Self, FleetwireError> {
        let session_id = session_id.into();
        let trace_id = trace_id.into();
        if session_id.trim().is_empty() {
            return Err(FleetwireError::InvalidEvent(
                "session_id must not be empty".to_string(),
            ));
        }
        Ok(Self {
            event_type,
            timestamp: Utc::now(),
            payload,
            trace_id,
            session_id,
        })
    }

    /// Severity tag from the payload; a missing tag defaults to `info`
    /// (used by the streaming server's severity filter).
    pub fn severity(&self) -> &str {
        self.payload
            .get("severity")
            .and_then(Value::as_str)
            .unwrap_or("info")
    }

    /// Agent name carried by agent-lifecycle events, when present.
    pub fn agent_name(&self) -> Option<&str> {
        self.payload.get("agent")?.get("name")?.as_str()
    }

    /// Workflow id carried by workflow/phase events, when present.
    pub fn workflow_id(&self) -> Option<&str> {
        self.payload.get("workflow_id").and_then(Value::as_str)
    }

    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Builds the minimal-required payload shapes from §6. Unknown/extra fields
/// passed through `extra` are merged in, preserving forward compatibility.
pub mod payload {
    use super::*;

    pub fn agent_invoked(
        agent_name: &str,
        task_type: Option<&str>,
        context_tokens: Option<u64>,
        files: &[String],
        invoked_by: Option<&str>,
        reason: Option<&str>,
    ) -> Value {
        json!({
            "agent": { "name": agent_name },
            "task_type": task_type,
            "context_tokens": context_tokens,
            "files": files,
            "invoked_by": invoked_by,
            "reason": reason,
        })
    }

    pub fn agent_completed(
        agent_name: &str,
        duration_ms: u64,
        tokens: Option<u64>,
        cost: Option<f64>,
        model: Option<&str>,
    ) -> Value {
        json!({
            "agent": { "name": agent_name },
            "duration_ms": duration_ms,
            "tokens": tokens,
            "cost": cost,
            "model": model,
        })
    }

    pub fn agent_failed(
        agent_name: &str,
        error_kind: &str,
        error_message: &str,
        duration_ms: u64,
        cause: Option<&str>,
    ) -> Value {
        json!({
            "agent": { "name": agent_name },
            "error": { "kind": error_kind, "message": error_message },
            "duration_ms": duration_ms,
            "cause": cause,
        })
    }

    pub fn model_selected(
        model: &str,
        tier: &str,
        complexity_score: u32,
        routing_reason: &str,
        free_tier: bool,
    ) -> Value {
        json!({
            "model": model,
            "tier": tier,
            "complexity_score": complexity_score,
            "routing_reason": routing_reason,
            "free_tier": free_tier,
        })
    }

    pub fn workflow(workflow_id: &str, task_count: usize, result: Option<Value>) -> Value {
        json!({
            "workflow_id": workflow_id,
            "task_count": task_count,
            "result": result,
        })
    }

    pub fn phase(workflow_id: &str, phase: &str) -> Value {
        json!({
            "workflow_id": workflow_id,
            "phase": phase,
        })
    }
}
