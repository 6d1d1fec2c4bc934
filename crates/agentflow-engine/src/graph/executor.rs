use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use agentflow_core::config::EngineConfig;
use agentflow_core::error::{CollaboratorKind, FlowError, Result};
use agentflow_core::event::EventBus;
use agentflow_core::traits::PromptRequest;
use agentflow_core::types::{FlowEvent, RunId};
use agentflow_core::value::{Object, Value};
use agentflow_dsl::{Edge, EdgeKind, NodeDef, NodeKind, Workflow};

use super::condition::evaluate_condition;
use super::state::{ConditionError, ExecutionState};
use super::template::{resolve_template, resolve_variables};
use crate::registry::Collaborators;

/// A node whose outgoing edges are still being walked.
struct Frame<'a> {
    node: &'a NodeDef,
    cursor: usize,
}

/// Walks one workflow for one run.
///
/// Dispatch is strictly sequential: starting from each input node in
/// declaration order, a node runs, then each of its outgoing edges is taken
/// in declaration order, depth first. A node reachable along several paths
/// runs once per path. Taking an edge back to a node that is still on the
/// current path fails with `CycleDetected`.
pub struct GraphExecutor<'a> {
    workflow: &'a Workflow,
    collaborators: &'a Collaborators,
    limits: &'a EngineConfig,
    events: Option<&'a EventBus>,
    run_id: RunId,
}

impl<'a> GraphExecutor<'a> {
    pub fn new(
        workflow: &'a Workflow,
        collaborators: &'a Collaborators,
        limits: &'a EngineConfig,
    ) -> Self {
        Self {
            workflow,
            collaborators,
            limits,
            events: None,
            run_id: RunId::new(),
        }
    }

    pub fn with_events(mut self, events: Option<&'a EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Execute the workflow against `state`, starting at every input node.
    pub async fn run(&self, state: &mut ExecutionState) -> Result<()> {
        let workflow: &'a Workflow = self.workflow;
        let entries: Vec<&'a NodeDef> = workflow.input_nodes().collect();
        if entries.is_empty() {
            return Err(FlowError::NoInputNode(self.workflow.name.clone()));
        }

        for entry in entries {
            self.walk(&entry.name, state).await?;
        }

        state.complete();
        Ok(())
    }

    async fn walk(&self, entry: &str, state: &mut ExecutionState) -> Result<()> {
        let first = self.dispatch(entry, state).await?;
        let mut stack = vec![Frame {
            node: first,
            cursor: 0,
        }];

        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };
            let Some(edge) = self.next_edge(frame) else {
                stack.pop();
                continue;
            };
            let source = frame.node;

            if self.should_follow(source, edge, state) {
                if stack.iter().any(|f| f.node.name == edge.target) {
                    let path = stack
                        .iter()
                        .map(|f| f.node.name.clone())
                        .skip_while(|name| *name != edge.target)
                        .collect();
                    warn!(node = %edge.target, "Cycle detected, aborting run");
                    return Err(FlowError::CycleDetected {
                        workflow: self.workflow.name.clone(),
                        node: edge.target.clone(),
                        path,
                    });
                }
                let node = self.dispatch(&edge.target, state).await?;
                stack.push(Frame { node, cursor: 0 });
            }
        }

        Ok(())
    }

    fn next_edge(&self, frame: &mut Frame<'a>) -> Option<&'a Edge> {
        let workflow: &'a Workflow = self.workflow;
        let edges = &workflow.edges;
        while frame.cursor < edges.len() {
            let edge = &edges[frame.cursor];
            frame.cursor += 1;
            if edge.source == frame.node.name {
                return Some(edge);
            }
        }
        None
    }

    fn should_follow(&self, source: &NodeDef, edge: &Edge, state: &ExecutionState) -> bool {
        let expected = match edge.kind {
            EdgeKind::Sequence => {
                debug!(from = %edge.source, to = %edge.target, "Following sequence edge");
                return true;
            }
            EdgeKind::ConditionTrue => true,
            EdgeKind::ConditionFalse => false,
        };

        if source.kind != NodeKind::Condition {
            warn!(
                from = %edge.source,
                to = %edge.target,
                kind = %source.kind,
                "Conditional edge from non-condition node, skipping"
            );
            return false;
        }

        let outcome = state
            .result(&source.name)
            .map(Value::is_truthy)
            .unwrap_or(false);
        let follow = outcome == expected;
        debug!(
            from = %edge.source,
            to = %edge.target,
            edge = %edge.kind,
            outcome,
            follow,
            "Evaluated conditional edge"
        );
        follow
    }

    async fn dispatch(&self, name: &str, state: &mut ExecutionState) -> Result<&'a NodeDef> {
        let workflow: &'a Workflow = self.workflow;
        let node = workflow
            .node(name)
            .ok_or_else(|| FlowError::NodeNotFound {
                workflow: self.workflow.name.clone(),
                node: name.to_string(),
            })?;

        if state.execution_path.len() >= self.limits.max_node_visits {
            return Err(FlowError::VisitLimitExceeded {
                node: name.to_string(),
                visits: state.execution_path.len() + 1,
            });
        }
        let per_node = self.limits.max_visits_per_node;
        if per_node > 0 && state.visits(name) >= per_node {
            return Err(FlowError::VisitLimitExceeded {
                node: name.to_string(),
                visits: state.visits(name) + 1,
            });
        }

        state.enter_node(name);
        debug!(node = %name, kind = %node.kind, "Dispatching node");
        self.publish(FlowEvent::NodeStarted {
            run_id: self.run_id.clone(),
            workflow: workflow.name.clone(),
            node: name.to_string(),
            kind: node.kind.to_string(),
        });

        match node.kind {
            NodeKind::Input => {}
            NodeKind::Agent => self.run_agent(node, state).await?,
            NodeKind::Function => self.run_function(node, state).await?,
            NodeKind::Prompt => self.run_prompt(node, state).await?,
            NodeKind::Condition => self.run_condition(node, state),
            NodeKind::Output => {
                let key = node.param_or("key", "result").to_string();
                let value = resolve_variables(node.param_or("value", "{}"), state);
                state.output.insert(key, value);
            }
        }

        self.publish(FlowEvent::NodeCompleted {
            run_id: self.run_id.clone(),
            workflow: workflow.name.clone(),
            node: name.to_string(),
        });
        Ok(node)
    }

    async fn run_agent(&self, node: &NodeDef, state: &mut ExecutionState) -> Result<()> {
        let agent_name = node.param_or("name", "");
        let agent = self
            .collaborators
            .agent(agent_name)
            .await
            .ok_or_else(|| FlowError::UnregisteredCollaborator {
                kind: CollaboratorKind::Agent,
                name: agent_name.to_string(),
            })?;

        let input = resolve_variables(node.param_or("input", "{}"), state);
        let result = self
            .invoke(node, agent_name, agent.timeout_secs(), agent.run(input), state)
            .await?;
        state.set_result(&node.name, result);
        Ok(())
    }

    async fn run_function(&self, node: &NodeDef, state: &mut ExecutionState) -> Result<()> {
        let function_name = node.param_or("name", "");
        let function = self
            .collaborators
            .function(function_name)
            .await
            .ok_or_else(|| FlowError::UnregisteredCollaborator {
                kind: CollaboratorKind::Function,
                name: function_name.to_string(),
            })?;

        let params = match resolve_variables(node.param_or("input", "{}"), state) {
            Value::Object(params) => params,
            other => {
                return Err(FlowError::CollaboratorFailed {
                    node: node.name.clone(),
                    collaborator: function_name.to_string(),
                    message: format!(
                        "function input must be an object, got {}",
                        other.type_name()
                    ),
                    trace: Box::new(state.trace()),
                })
            }
        };

        let result = self
            .invoke(
                node,
                function_name,
                function.timeout_secs(),
                function.call(params),
                state,
            )
            .await?;
        state.set_result(&node.name, result);
        Ok(())
    }

    async fn run_prompt(&self, node: &NodeDef, state: &mut ExecutionState) -> Result<()> {
        let executor = self.collaborators.prompt_executor().await.ok_or_else(|| {
            FlowError::UnregisteredCollaborator {
                kind: CollaboratorKind::Prompt,
                name: node.name.clone(),
            }
        })?;

        let request = PromptRequest {
            node: node.name.clone(),
            system: resolve_template(node.param_or("system", ""), state),
            user: resolve_template(node.param_or("user", ""), state),
            model: node.param("model").map(|m| resolve_template(m, state)),
            temperature: node.param("temperature").and_then(|t| t.trim().parse().ok()),
            max_tokens: node.param("max_tokens").and_then(|t| t.trim().parse().ok()),
        };
        let system_prompt = request.system.clone();
        let user_prompt = request.user.clone();

        let response = self
            .invoke(node, "prompt", None, executor.complete(request), state)
            .await?;

        let mut result = Object::new();
        result.insert("system_prompt".into(), Value::String(system_prompt));
        result.insert("user_prompt".into(), Value::String(user_prompt));
        result.insert("response".into(), Value::String(response));
        state.set_result(&node.name, Value::Object(result));
        Ok(())
    }

    fn run_condition(&self, node: &NodeDef, state: &mut ExecutionState) {
        let expression = node.param_or("expression", "true");
        let outcome = match evaluate_condition(expression, state) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(node = %node.name, expression, error = %e, "Condition failed, treating as false");
                self.publish(FlowEvent::ConditionFailed {
                    run_id: self.run_id.clone(),
                    workflow: self.workflow.name.clone(),
                    node: node.name.clone(),
                    expression: expression.to_string(),
                    error: e.to_string(),
                });
                state.record_condition_error(ConditionError {
                    node: node.name.clone(),
                    expression: expression.to_string(),
                    message: e.to_string(),
                });
                false
            }
        };
        debug!(node = %node.name, outcome, "Condition evaluated");
        state.set_result(&node.name, Value::Bool(outcome));
    }

    /// Await a collaborator call under the configured timeout, attaching the
    /// run trace to any failure it reports.
    async fn invoke<T>(
        &self,
        node: &NodeDef,
        collaborator: &str,
        timeout_override: Option<u64>,
        call: impl Future<Output = Result<T>>,
        state: &ExecutionState,
    ) -> Result<T> {
        let timeout_secs = timeout_override.unwrap_or(self.limits.collaborator_timeout_secs);

        let result = if timeout_secs == 0 {
            call.await
        } else {
            match tokio::time::timeout(Duration::from_secs(timeout_secs), call).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(FlowError::CollaboratorTimeout {
                        node: node.name.clone(),
                        collaborator: collaborator.to_string(),
                        timeout_secs,
                    })
                }
            }
        };

        result.map_err(|e| {
            debug!(node = %node.name, collaborator, error = %e, "Collaborator call failed");
            FlowError::CollaboratorFailed {
                node: node.name.clone(),
                collaborator: collaborator.to_string(),
                message: e.to_string(),
                trace: Box::new(state.trace()),
            }
        })
    }

    fn publish(&self, event: FlowEvent) {
        if let Some(events) = self.events {
            events.publish(event);
        }
    }
}
