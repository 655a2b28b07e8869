//! Agent Coordinator (C6): validates a workflow's dependency graph and
//! executes it phase-ordered (SCOUT, PLAN, BUILD) with intra-phase
//! parallelism, cascade cancellation, and workflow-level cooperative
//! cancellation.

pub mod dag;
pub mod executor;
pub mod registry;

pub use executor::{Coordinator, CoordinatorStats};
pub use registry::{AgentHandler, AgentRegistry};
