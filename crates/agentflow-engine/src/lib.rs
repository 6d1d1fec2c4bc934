//! Workflow execution.
//!
//! [`FlowEngine`] owns registered workflows and the collaborators they call
//! (agents, functions, and a prompt executor) and runs workflows against
//! caller input, one node at a time.

pub mod engine;
pub mod graph;
pub mod registry;

pub use engine::{ExecutionReport, FlowEngine};
pub use graph::{ExecutionState, GraphExecutor, RunStatus};
pub use registry::{AgentRegistry, Collaborators, FunctionRegistry, Registry, WorkflowRegistry};
