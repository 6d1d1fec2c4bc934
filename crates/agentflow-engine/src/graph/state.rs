use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use agentflow_core::error::ExecutionTrace;
use agentflow_core::value::{Object, Value};

/// Lifecycle of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Running { current_node: String },
    Completed,
    Failed { error: String },
}

/// A condition that failed to evaluate and was treated as false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionError {
    pub node: String,
    pub expression: String,
    pub message: String,
}

/// Per-run mutable context, exclusively owned by one execution.
///
/// Variables start as a copy of the workflow's variables; node results are
/// written back as `<node>_result`. Lookups check variables before input.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub input: Object,
    pub variables: Object,
    pub output: Object,
    pub execution_path: Vec<String>,
    pub current_node: Option<String>,
    pub status: RunStatus,
    pub condition_errors: Vec<ConditionError>,
    visits: HashMap<String, usize>,
}

impl ExecutionState {
    pub fn new(input: Object, variables: Object) -> Self {
        Self {
            input,
            variables,
            output: Object::new(),
            execution_path: Vec::new(),
            current_node: None,
            status: RunStatus::NotStarted,
            condition_errors: Vec::new(),
            visits: HashMap::new(),
        }
    }

    /// Resolve a bare name: workflow variables first, then caller input.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.variables.get(name).or_else(|| self.input.get(name))
    }

    /// Walk a dotted path (`a.b.c`) through nested objects in the variables.
    pub fn lookup_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.variables.get(first)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Record entry into a node. Returns how many times it has now been entered.
    pub fn enter_node(&mut self, name: &str) -> usize {
        self.execution_path.push(name.to_string());
        self.current_node = Some(name.to_string());
        self.status = RunStatus::Running {
            current_node: name.to_string(),
        };
        let count = self.visits.entry(name.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Times `name` has been entered so far.
    pub fn visits(&self, name: &str) -> usize {
        self.visits.get(name).copied().unwrap_or(0)
    }

    pub fn set_result(&mut self, node: &str, value: Value) {
        self.variables.insert(format!("{node}_result"), value);
    }

    pub fn result(&self, node: &str) -> Option<&Value> {
        self.variables.get(&format!("{node}_result"))
    }

    pub fn record_condition_error(&mut self, error: ConditionError) {
        self.condition_errors.push(error);
    }

    pub fn complete(&mut self) {
        self.current_node = None;
        self.status = RunStatus::Completed;
    }

    pub fn fail(&mut self, error: &impl std::fmt::Display) {
        self.status = RunStatus::Failed {
            error: error.to_string(),
        };
    }

    /// Snapshot of the path and output, attached to collaborator failures.
    pub fn trace(&self) -> ExecutionTrace {
        ExecutionTrace {
            execution_path: self.execution_path.clone(),
            partial_output: self.output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(pairs: &[(&str, Value)]) -> Object {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_variables_shadow_input() {
        let state = ExecutionState::new(
            object(&[("name", Value::from("input")), ("only_input", Value::Int(1))]),
            object(&[("name", Value::from("variable"))]),
        );
        assert_eq!(state.lookup("name"), Some(&Value::from("variable")));
        assert_eq!(state.lookup("only_input"), Some(&Value::Int(1)));
        assert_eq!(state.lookup("missing"), None);
    }

    #[test]
    fn test_lookup_path() {
        let user = object(&[("profile", Value::Object(object(&[("city", Value::from("Oslo"))])))]);
        let state = ExecutionState::new(
            object(&[("user", Value::from("input is not searched"))]),
            object(&[("user", Value::Object(user))]),
        );
        assert_eq!(state.lookup_path("user.profile.city"), Some(&Value::from("Oslo")));
        assert_eq!(state.lookup_path("user.profile.zip"), None);
        assert_eq!(state.lookup_path("user.profile.city.more"), None);
    }

    #[test]
    fn test_enter_node_tracks_path_and_visits() {
        let mut state = ExecutionState::new(Object::new(), Object::new());
        assert_eq!(state.status, RunStatus::NotStarted);

        assert_eq!(state.enter_node("a"), 1);
        assert_eq!(state.enter_node("b"), 1);
        assert_eq!(state.enter_node("a"), 2);
        assert_eq!(state.execution_path, vec!["a", "b", "a"]);
        assert_eq!(state.visits("a"), 2);
        assert_eq!(
            state.status,
            RunStatus::Running {
                current_node: "a".into()
            }
        );

        state.complete();
        assert_eq!(state.status, RunStatus::Completed);
        assert!(state.current_node.is_none());
    }

    #[test]
    fn test_results_and_trace() {
        let mut state = ExecutionState::new(Object::new(), Object::new());
        state.enter_node("cond");
        state.set_result("cond", Value::Bool(true));
        state.output.insert("result".into(), Value::from("partial"));

        assert_eq!(state.result("cond"), Some(&Value::Bool(true)));
        assert_eq!(state.variables["cond_result"], Value::Bool(true));

        let trace = state.trace();
        assert_eq!(trace.execution_path, vec!["cond"]);
        assert_eq!(trace.partial_output["result"], Value::from("partial"));

        state.fail(&"boom");
        assert_eq!(
            state.status,
            RunStatus::Failed {
                error: "boom".into()
            }
        );
    }
}
