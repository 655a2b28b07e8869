//! Agent handler registry: maps an `agent_name` to the callable that
//! executes tasks bound to it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use fleetwire_types::{AgentTask, FleetwireError, FleetwireResult};

/// A registered agent. Invoked with the task's spec, a read-only view of
/// its predecessors' results keyed by `task_id`, and a cancellation token.
///
/// The coordinator never forcibly aborts a handler (spec.md §9): `cancel`
/// is advisory and the handler is responsible for honouring it.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    async fn run(
        &self,
        task: &AgentTask,
        predecessors: &HashMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<Value, String>;
}

#[derive(Clone, Default)]
pub struct AgentRegistry {
    handlers: HashMap<String, Arc<dyn AgentHandler>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent_name: impl Into<String>, handler: Arc<dyn AgentHandler>) {
        self.handlers.insert(agent_name.into(), handler);
    }

    pub fn get(&self, agent_name: &str) -> FleetwireResult<Arc<dyn AgentHandler>> {
        self.handlers
            .get(agent_name)
            .cloned()
            .ok_or_else(|| FleetwireError::UnknownAgent(agent_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl AgentHandler for Echo {
        async fn run(
            &self,
            _task: &AgentTask,
            _predecessors: &HashMap<String, Value>,
            _cancel: CancellationToken,
        ) -> Result<Value, String> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn lookup_of_unregistered_agent_fails() {
        let registry = AgentRegistry::new();
        let err = registry.get("ghost").unwrap_err();
        assert!(matches!(err, FleetwireError::UnknownAgent(name) if name == "ghost"));
    }

    #[test]
    fn lookup_of_registered_agent_succeeds() {
        let mut registry = AgentRegistry::new();
        registry.register("scout", Arc::new(Echo));
        assert!(registry.get("scout").is_ok());
    }
}
