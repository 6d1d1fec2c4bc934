use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a single workflow run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events emitted while workflows execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// A run started.
    RunStarted { run_id: RunId, workflow: String },
    /// A node is about to be dispatched.
    NodeStarted {
        run_id: RunId,
        workflow: String,
        node: String,
        kind: String,
    },
    /// A node finished its own work (before its successors run).
    NodeCompleted {
        run_id: RunId,
        workflow: String,
        node: String,
    },
    /// A condition could not be evaluated and was treated as false.
    ConditionFailed {
        run_id: RunId,
        workflow: String,
        node: String,
        expression: String,
        error: String,
    },
    /// A run finished normally.
    RunCompleted {
        run_id: RunId,
        workflow: String,
        visited: usize,
    },
    /// A run aborted.
    RunFailed {
        run_id: RunId,
        workflow: String,
        error: String,
    },
}
