//! Recording collaborators.
//!
//! Each mock keeps every call it receives behind a shared handle, so a test
//! can hand a clone to the engine and inspect the calls afterwards.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use agentflow_core::error::{FlowError, Result};
use agentflow_core::traits::{Agent, Function, PromptExecutor, PromptRequest};
use agentflow_core::value::{Object, Value};

#[derive(Debug, Clone)]
enum Reply {
    Echo,
    Fixed(Value),
    Fail(String),
}

impl Reply {
    fn produce(&self, input: Value) -> Result<Value> {
        match self {
            Reply::Echo => Ok(input),
            Reply::Fixed(value) => Ok(value.clone()),
            Reply::Fail(message) => Err(FlowError::Collaborator(message.clone())),
        }
    }
}

fn record<T: Clone>(log: &Mutex<Vec<T>>, item: T) {
    log.lock().unwrap_or_else(|e| e.into_inner()).push(item);
}

fn snapshot<T: Clone>(log: &Mutex<Vec<T>>) -> Vec<T> {
    log.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Mock agent returning its input, a fixed value, or an error.
#[derive(Debug, Clone)]
pub struct MockAgent {
    reply: Reply,
    delay: Option<Duration>,
    timeout_secs: Option<u64>,
    calls: Arc<Mutex<Vec<Value>>>,
}

impl MockAgent {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            delay: None,
            timeout_secs: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn echo() -> Self {
        Self::with_reply(Reply::Echo)
    }

    pub fn returning(value: impl Into<Value>) -> Self {
        Self::with_reply(Reply::Fixed(value.into()))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_reply(Reply::Fail(message.into()))
    }

    /// Sleep before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Inputs received so far, in call order.
    pub fn calls(&self) -> Vec<Value> {
        snapshot(&self.calls)
    }
}

impl Agent for MockAgent {
    fn run(&self, input: Value) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            record(&self.calls, input.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.produce(input)
        })
    }

    fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }
}

/// Mock function; echo replies with the parameters as an object.
#[derive(Debug, Clone)]
pub struct MockFunction {
    reply: Reply,
    calls: Arc<Mutex<Vec<Object>>>,
}

impl MockFunction {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn echo() -> Self {
        Self::with_reply(Reply::Echo)
    }

    pub fn returning(value: impl Into<Value>) -> Self {
        Self::with_reply(Reply::Fixed(value.into()))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_reply(Reply::Fail(message.into()))
    }

    pub fn calls(&self) -> Vec<Object> {
        snapshot(&self.calls)
    }
}

impl Function for MockFunction {
    fn call(&self, params: Object) -> BoxFuture<'_, Result<Value>> {
        record(&self.calls, params.clone());
        let result = self.reply.produce(Value::Object(params));
        Box::pin(async move { result })
    }
}

/// Mock prompt executor.
///
/// Replies "Mock response" unless configured otherwise.
#[derive(Debug, Clone)]
pub struct MockPromptExecutor {
    response: std::result::Result<String, String>,
    requests: Arc<Mutex<Vec<PromptRequest>>>,
}

impl Default for MockPromptExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPromptExecutor {
    pub fn new() -> Self {
        Self::with_response("Mock response")
    }

    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: Ok(response.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<PromptRequest> {
        snapshot(&self.requests)
    }
}

impl PromptExecutor for MockPromptExecutor {
    fn complete(&self, request: PromptRequest) -> BoxFuture<'_, Result<String>> {
        record(&self.requests, request);
        let result = self.response.clone().map_err(FlowError::Collaborator);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_agent_records_calls() {
        let agent = MockAgent::echo();
        let handle = agent.clone();
        assert_eq!(agent.run(Value::from("a")).await.unwrap(), Value::from("a"));
        assert_eq!(handle.calls(), vec![Value::from("a")]);
    }

    #[tokio::test]
    async fn test_mock_agent_failure() {
        let agent = MockAgent::failing("nope");
        let err = agent.run(Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[tokio::test]
    async fn test_mock_function_echo() {
        let function = MockFunction::echo();
        let mut params = Object::new();
        params.insert("x".into(), Value::Int(1));
        let out = function.call(params.clone()).await.unwrap();
        assert_eq!(out, Value::Object(params.clone()));
        assert_eq!(function.calls(), vec![params]);
    }

    #[tokio::test]
    async fn test_mock_prompt_executor() {
        let executor = MockPromptExecutor::new();
        let request = PromptRequest {
            node: "p".into(),
            user: "hi".into(),
            ..Default::default()
        };
        assert_eq!(executor.complete(request).await.unwrap(), "Mock response");
        assert_eq!(executor.requests()[0].user, "hi");

        let failing = MockPromptExecutor::failing("offline");
        assert!(failing.complete(PromptRequest::default()).await.is_err());
    }
}
