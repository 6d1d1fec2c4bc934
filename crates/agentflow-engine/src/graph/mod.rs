//! Graph execution: per-run state, template and condition resolution, and the
//! depth-first walker that dispatches nodes and follows edges.
//!
//! Results of each node land in the run's variables as `<node>_result`, where
//! later templates, parameters and conditions can read them.

pub mod condition;
pub mod executor;
pub mod state;
pub mod template;

pub use condition::evaluate_condition;
pub use executor::GraphExecutor;
pub use state::{ConditionError, ExecutionState, RunStatus};
pub use template::{resolve_template, resolve_variables};
