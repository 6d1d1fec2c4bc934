use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use agentflow_core::traits::{Agent, Function, PromptExecutor};
use agentflow_dsl::Workflow;

/// Name-keyed registry of shared entries.
pub struct Registry<T: ?Sized> {
    entries: HashMap<String, Arc<T>>,
}

pub type AgentRegistry = Registry<dyn Agent>;
pub type FunctionRegistry = Registry<dyn Function>;
pub type WorkflowRegistry = Registry<Workflow>;

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register an entry, returning the one it replaced.
    pub fn register(&mut self, name: impl Into<String>, entry: Arc<T>) -> Option<Arc<T>> {
        self.entries.insert(name.into(), entry)
    }

    /// Unregister an entry by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Get an entry by name.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a run may call out to.
///
/// Each registry sits behind its own lock; executors clone the entry they
/// need and release the lock before awaiting it.
#[derive(Default)]
pub struct Collaborators {
    pub agents: RwLock<AgentRegistry>,
    pub functions: RwLock<FunctionRegistry>,
    pub prompt: RwLock<Option<Arc<dyn PromptExecutor>>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn agent(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().await.get(name)
    }

    pub async fn function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.read().await.get(name)
    }

    pub async fn prompt_executor(&self) -> Option<Arc<dyn PromptExecutor>> {
        self.prompt.read().await.clone()
    }
}
