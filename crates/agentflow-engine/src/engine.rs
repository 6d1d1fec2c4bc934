use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use agentflow_core::config::EngineConfig;
use agentflow_core::error::{FlowError, Result};
use agentflow_core::event::EventBus;
use agentflow_core::traits::{Agent, Function, PromptExecutor};
use agentflow_core::types::{FlowEvent, RunId};
use agentflow_core::value::Object;
use agentflow_dsl::{RegistryEntry, Workflow};

use crate::graph::{ConditionError, ExecutionState, GraphExecutor, RunStatus};
use crate::registry::{Collaborators, WorkflowRegistry};

/// Everything observable about a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub run_id: RunId,
    pub workflow: String,
    pub status: RunStatus,
    pub output: Object,
    pub execution_path: Vec<String>,
    pub variables: Object,
    pub condition_errors: Vec<ConditionError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Holds registered workflows and collaborators, and runs workflows.
///
/// Safe to share across tasks: each run owns its own [`ExecutionState`] and
/// only reads the registries.
pub struct FlowEngine {
    workflows: RwLock<WorkflowRegistry>,
    collaborators: Collaborators,
    config: EngineConfig,
    events: Option<EventBus>,
}

impl Default for FlowEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl FlowEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            workflows: RwLock::new(WorkflowRegistry::new()),
            collaborators: Collaborators::new(),
            config,
            events: None,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_prompt_executor(mut self, executor: impl PromptExecutor) -> Self {
        self.collaborators.prompt = RwLock::new(Some(Arc::new(executor)));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.events.as_ref()
    }

    /// Parse workflow text and register the result under its name.
    pub async fn parse_workflow(&self, text: &str) -> Result<Arc<Workflow>> {
        let workflow = agentflow_dsl::parse_workflow(text)?;
        Ok(self.register_workflow(workflow).await)
    }

    /// Register a workflow, replacing any with the same name.
    pub async fn register_workflow(&self, workflow: Workflow) -> Arc<Workflow> {
        let dangling = workflow.dangling_endpoints();
        if !dangling.is_empty() {
            debug!(workflow = %workflow.name, ?dangling, "Workflow has edges to undefined nodes");
        }

        let workflow = Arc::new(workflow);
        let replaced = self
            .workflows
            .write()
            .await
            .register(workflow.name.clone(), Arc::clone(&workflow));
        info!(
            workflow = %workflow.name,
            nodes = workflow.nodes.len(),
            edges = workflow.edges.len(),
            replaced = replaced.is_some(),
            "Registered workflow"
        );
        workflow
    }

    pub async fn workflow(&self, name: &str) -> Option<Arc<Workflow>> {
        self.workflows.read().await.get(name)
    }

    pub async fn workflow_names(&self) -> Vec<String> {
        self.workflows
            .read()
            .await
            .list()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub async fn register_agent(&self, name: impl Into<String>, agent: impl Agent) {
        let name = name.into();
        debug!(agent = %name, "Registered agent");
        self.collaborators
            .agents
            .write()
            .await
            .register(name, Arc::new(agent));
    }

    pub async fn register_function(&self, name: impl Into<String>, function: impl Function) {
        let name = name.into();
        debug!(function = %name, "Registered function");
        self.collaborators
            .functions
            .write()
            .await
            .register(name, Arc::new(function));
    }

    pub async fn set_prompt_executor(&self, executor: impl PromptExecutor) {
        *self.collaborators.prompt.write().await = Some(Arc::new(executor));
    }

    pub async fn unregister_agent(&self, name: &str) -> bool {
        self.collaborators.agents.write().await.unregister(name)
    }

    pub async fn unregister_function(&self, name: &str) -> bool {
        self.collaborators.functions.write().await.unregister(name)
    }

    /// Run a registered workflow and return its output mapping.
    pub async fn execute_workflow(&self, name: &str, input: Object) -> Result<Object> {
        Ok(self.run_workflow(name, input).await?.output)
    }

    /// Run a registered workflow and return the full report.
    pub async fn run_workflow(&self, name: &str, input: Object) -> Result<ExecutionReport> {
        let workflow = self
            .workflow(name)
            .await
            .ok_or_else(|| FlowError::WorkflowNotFound(name.to_string()))?;

        let executor = GraphExecutor::new(&workflow, &self.collaborators, &self.config)
            .with_events(self.events.as_ref());
        let run_id = executor.run_id().clone();
        let mut state = ExecutionState::new(input, workflow.variables.clone());
        let started_at = Utc::now();

        info!(workflow = %workflow.name, run_id = %run_id, "Starting workflow");
        self.publish(FlowEvent::RunStarted {
            run_id: run_id.clone(),
            workflow: workflow.name.clone(),
        });

        match executor.run(&mut state).await {
            Ok(()) => {
                info!(
                    workflow = %workflow.name,
                    run_id = %run_id,
                    visited = state.execution_path.len(),
                    "Workflow complete"
                );
                self.publish(FlowEvent::RunCompleted {
                    run_id: run_id.clone(),
                    workflow: workflow.name.clone(),
                    visited: state.execution_path.len(),
                });
                Ok(ExecutionReport {
                    run_id,
                    workflow: workflow.name.clone(),
                    status: state.status,
                    output: state.output,
                    execution_path: state.execution_path,
                    variables: state.variables,
                    condition_errors: state.condition_errors,
                    started_at,
                    finished_at: Utc::now(),
                })
            }
            Err(e) => {
                state.fail(&e);
                error!(
                    workflow = %workflow.name,
                    run_id = %run_id,
                    node = ?state.current_node,
                    error = %e,
                    "Workflow failed"
                );
                self.publish(FlowEvent::RunFailed {
                    run_id,
                    workflow: workflow.name.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Register a JSON-serialized workflow and run it.
    pub async fn execute_definition(&self, definition: &str, input: Object) -> Result<Object> {
        let workflow = Workflow::from_json(definition)?;
        let name = workflow.name.clone();
        self.register_workflow(workflow).await;
        self.execute_workflow(&name, input).await
    }

    /// Registry entries for a registered workflow.
    pub async fn export_registry(&self, name: &str) -> Result<BTreeMap<String, RegistryEntry>> {
        let workflow = self
            .workflow(name)
            .await
            .ok_or_else(|| FlowError::WorkflowNotFound(name.to_string()))?;
        agentflow_dsl::export_registry(&workflow)
    }

    /// Parse and register every `*.<extension>` file in `dir`, in file name
    /// order. Returns the registered workflow names.
    pub async fn load_dir(&self, dir: &Path, extension: &str) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut names = Vec::with_capacity(paths.len());
        for path in paths {
            let text = std::fs::read_to_string(&path)?;
            let workflow = self.parse_workflow(&text).await.map_err(|e| {
                error!(path = %path.display(), error = %e, "Failed to parse workflow file");
                e
            })?;
            names.push(workflow.name.clone());
        }
        Ok(names)
    }

    fn publish(&self, event: FlowEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
