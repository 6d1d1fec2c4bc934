//! Mocks and fixtures shared by agentflow tests.

pub mod fixtures;
pub mod mock;

pub use fixtures::write_workflow_dir;
pub use mock::{MockAgent, MockFunction, MockPromptExecutor};
