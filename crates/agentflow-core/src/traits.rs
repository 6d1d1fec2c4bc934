use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::{Object, Value};

/// Invoked by `agent(...)` nodes with their resolved input.
pub trait Agent: Send + Sync + 'static {
    fn run(&self, input: Value) -> BoxFuture<'_, Result<Value>>;

    /// Per-agent timeout override in seconds.
    fn timeout_secs(&self) -> Option<u64> {
        None
    }
}

/// Invoked by `function(...)` nodes with keyword parameters.
pub trait Function: Send + Sync + 'static {
    fn call(&self, params: Object) -> BoxFuture<'_, Result<Value>>;

    /// Per-function timeout override in seconds.
    fn timeout_secs(&self) -> Option<u64> {
        None
    }
}

/// A resolved prompt ready for completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Name of the prompt node issuing the request.
    pub node: String,
    pub system: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Completes `prompt(...)` nodes, typically against an LLM.
pub trait PromptExecutor: Send + Sync + 'static {
    fn complete(&self, request: PromptRequest) -> BoxFuture<'_, Result<String>>;
}

/// Adapts a synchronous closure into an [`Agent`].
pub struct FnAgent<F>(pub F);

impl<F> FnAgent<F>
where
    F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Agent for FnAgent<F>
where
    F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
{
    fn run(&self, input: Value) -> BoxFuture<'_, Result<Value>> {
        let result = (self.0)(input);
        Box::pin(async move { result })
    }
}

/// Adapts a synchronous closure into a [`Function`].
pub struct FnFunction<F>(pub F);

impl<F> FnFunction<F>
where
    F: Fn(Object) -> Result<Value> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Function for FnFunction<F>
where
    F: Fn(Object) -> Result<Value> + Send + Sync + 'static,
{
    fn call(&self, params: Object) -> BoxFuture<'_, Result<Value>> {
        let result = (self.0)(params);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;

    #[tokio::test]
    async fn test_fn_agent() {
        let agent = FnAgent::new(|input: Value| Ok(Value::from(format!("seen {input}"))));
        let out = agent.run(Value::from("x")).await.unwrap();
        assert_eq!(out, Value::from("seen x"));
        assert_eq!(agent.timeout_secs(), None);
    }

    #[tokio::test]
    async fn test_fn_function_error() {
        let func = FnFunction::new(|params: Object| {
            if params.contains_key("n") {
                Ok(Value::Bool(true))
            } else {
                Err(FlowError::Collaborator("missing n".into()))
            }
        });
        assert!(func.call(Object::new()).await.is_err());

        let mut params = Object::new();
        params.insert("n".into(), Value::Int(1));
        assert_eq!(func.call(params).await.unwrap(), Value::Bool(true));
    }
}
