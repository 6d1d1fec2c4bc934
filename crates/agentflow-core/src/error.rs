use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Object;

/// The kind of collaborator a node delegates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorKind {
    Agent,
    Function,
    Prompt,
}

impl fmt::Display for CollaboratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollaboratorKind::Agent => "agent",
            CollaboratorKind::Function => "function",
            CollaboratorKind::Prompt => "prompt",
        })
    }
}

/// Snapshot of a run at the moment it aborted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// Nodes visited so far, in dispatch order.
    pub execution_path: Vec<String>,
    /// Output written before the failure.
    pub partial_output: Object,
}

#[derive(Debug, Error)]
pub enum FlowError {
    // Parse errors
    #[error("Format error on line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("Unknown node type on line {line}: {kind}")]
    UnknownNodeType { line: usize, kind: String },

    #[error("Invalid connection on line {line}: {message}")]
    InvalidConnection { line: usize, message: String },

    // Execution errors
    #[error("Workflow '{0}' not found")]
    WorkflowNotFound(String),

    #[error("No input nodes found in workflow '{0}'")]
    NoInputNode(String),

    #[error("Node '{node}' not found in workflow '{workflow}'")]
    NodeNotFound { workflow: String, node: String },

    #[error("Visit limit exceeded at node '{node}' ({visits} visits)")]
    VisitLimitExceeded { node: String, visits: usize },

    #[error("Cycle in workflow '{workflow}': {} -> {node}", path.join(" -> "))]
    CycleDetected {
        workflow: String,
        node: String,
        path: Vec<String>,
    },

    #[error("Condition '{expression}' could not be evaluated: {message}")]
    ConditionEval { expression: String, message: String },

    // Collaborator errors
    #[error("{kind} '{name}' not registered")]
    UnregisteredCollaborator { kind: CollaboratorKind, name: String },

    #[error("Node '{node}' failed calling '{collaborator}': {message}")]
    CollaboratorFailed {
        node: String,
        collaborator: String,
        message: String,
        trace: Box<ExecutionTrace>,
    },

    #[error("Node '{node}' timed out after {timeout_secs}s calling '{collaborator}'")]
    CollaboratorTimeout {
        node: String,
        collaborator: String,
        timeout_secs: u64,
    },

    /// Raised by collaborator implementations themselves.
    #[error("{0}")]
    Collaborator(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// True for errors produced while parsing workflow text.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            FlowError::Format { .. }
                | FlowError::UnknownNodeType { .. }
                | FlowError::InvalidConnection { .. }
        )
    }

    /// The trace attached to a collaborator failure, if any.
    pub fn trace(&self) -> Option<&ExecutionTrace> {
        match self {
            FlowError::CollaboratorFailed { trace, .. } => Some(trace),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_error_display() {
        let err = FlowError::UnregisteredCollaborator {
            kind: CollaboratorKind::Agent,
            name: "writer".into(),
        };
        assert_eq!(err.to_string(), "agent 'writer' not registered");

        let err = FlowError::Format {
            line: 1,
            message: "expected 'workflow: <name>'".into(),
        };
        assert!(err.to_string().contains("line 1"));
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_collaborator_failure_carries_trace() {
        let mut partial_output = Object::new();
        partial_output.insert("early".into(), Value::from("done"));
        let err = FlowError::CollaboratorFailed {
            node: "summarize".into(),
            collaborator: "summarizer".into(),
            message: "boom".into(),
            trace: Box::new(ExecutionTrace {
                execution_path: vec!["in".into(), "summarize".into()],
                partial_output,
            }),
        };

        let trace = err.trace().unwrap();
        assert_eq!(trace.execution_path, vec!["in", "summarize"]);
        assert_eq!(trace.partial_output["early"], Value::from("done"));
        assert!(!err.is_parse_error());
    }
}
