use thiserror::Error;

/// Closed error taxonomy shared by every runtime component.
///
/// `HandlerFailure`, `TaskFailure`, and `BudgetExceeded` are deliberately absent:
/// the spec treats them as non-propagating (they are recorded on a task or
/// counted on the bus, never returned to a caller).
#[derive(Debug, Error)]
pub enum FleetwireError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("task `{task_id}` depends on unknown task `{depends_on}`")]
    UnknownDependency { task_id: String, depends_on: String },

    #[error("circular dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("no model available in tier `{tier}`")]
    NoModelAvailable { tier: String },

    #[error("unknown agent `{0}`")]
    UnknownAgent(String),

    #[error("task `{task_id}` timed out after {elapsed_ms}ms")]
    Timeout { task_id: String, elapsed_ms: u64 },

    #[error("transport error: {0}")]
    TransportError(String),
}

pub type FleetwireResult<T> = Result<T, FleetwireError>;
