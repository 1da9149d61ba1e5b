//! Mock LLM client
//!
//! Deterministic stub backend for harnesses and integration tests: scripted
//! tool responses, injectable failures, and in-flight call tracking so tests
//! can assert bounded concurrency.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::llm_client::{LlmClient, ToolCallResult, ToolDefinition};
use crate::error::{CallError, CallResult};

/// Scripted, deterministic [`LlmClient`] implementation.
#[derive(Default)]
pub struct MockLlmClient {
    /// Fixed response per tool name, reused for every call.
    tool_responses: HashMap<String, serde_json::Value>,
    /// One-shot responses per tool name, consumed before the fixed response.
    queued_responses: Mutex<HashMap<String, VecDeque<serde_json::Value>>>,
    /// User-prompt substrings that trigger an injected parse failure.
    failure_triggers: Vec<String>,
    /// Simulated backend latency per call.
    delay: Option<Duration>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a fixed response for a tool, reused on every call.
    pub fn with_tool_response(mut self, tool_name: &str, arguments: serde_json::Value) -> Self {
        self.tool_responses.insert(tool_name.to_string(), arguments);
        self
    }

    /// Queue a one-shot response for a tool, consumed before the fixed one.
    pub fn push_tool_response(self, tool_name: &str, arguments: serde_json::Value) -> Self {
        self.queued_responses
            .lock()
            .expect("queued_responses poisoned")
            .entry(tool_name.to_string())
            .or_default()
            .push_back(arguments);
        self
    }

    /// Fail any call whose user prompt contains `needle`.
    pub fn fail_when_prompt_contains(mut self, needle: &str) -> Self {
        self.failure_triggers.push(needle.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls made to the given tool.
    pub fn calls(&self, tool_name: &str) -> usize {
        *self
            .calls
            .lock()
            .expect("calls poisoned")
            .get(tool_name)
            .unwrap_or(&0)
    }

    /// Highest number of calls observed in flight simultaneously.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record_call(&self, tool_name: &str) {
        *self
            .calls
            .lock()
            .expect("calls poisoned")
            .entry(tool_name.to_string())
            .or_insert(0) += 1;
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn injected_failure(&self, user_prompt: &str) -> Option<CallError> {
        self.failure_triggers
            .iter()
            .find(|needle| user_prompt.contains(needle.as_str()))
            .map(|needle| CallError::Parse(format!("injected failure for '{}'", needle)))
    }

    fn next_response(&self, tool_name: &str) -> Option<serde_json::Value> {
        let queued = self
            .queued_responses
            .lock()
            .expect("queued_responses poisoned")
            .get_mut(tool_name)
            .and_then(|q| q.pop_front());
        queued.or_else(|| self.tool_responses.get(tool_name).cloned())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(&self, _system_prompt: &str, user_prompt: &str) -> CallResult<String> {
        self.record_call("chat");
        if let Some(err) = self.injected_failure(user_prompt) {
            return Err(err);
        }
        Ok(String::from("mock response"))
    }

    async fn chat_json(&self, _system_prompt: &str, user_prompt: &str) -> CallResult<String> {
        self.record_call("chat_json");
        if let Some(err) = self.injected_failure(user_prompt) {
            return Err(err);
        }
        Ok(String::from("{}"))
    }

    async fn chat_with_tool(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> CallResult<ToolCallResult> {
        self.record_call(&tool.name);
        self.enter();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = if let Some(err) = self.injected_failure(user_prompt) {
            Err(err)
        } else {
            match self.next_response(&tool.name) {
                Some(arguments) => Ok(ToolCallResult {
                    tool_name: tool.name.clone(),
                    arguments,
                }),
                None => Err(CallError::Parse(format!(
                    "no scripted response for tool '{}'",
                    tool.name
                ))),
            }
        };

        self.exit();
        outcome
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    fn provider_name(&self) -> &str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool() -> ToolDefinition {
        ToolDefinition {
            name: "discover_codes".to_string(),
            description: "test".to_string(),
            parameters: json!({"type": "object"}),
        }
    }

    #[tokio::test]
    async fn scripted_response_and_counting() {
        let mock = MockLlmClient::new().with_tool_response("discover_codes", json!({"codes": []}));
        let result = mock.chat_with_tool("sys", "user", &tool()).await.unwrap();
        assert_eq!(result.arguments, json!({"codes": []}));
        assert_eq!(mock.calls("discover_codes"), 1);
    }

    #[tokio::test]
    async fn queued_responses_consumed_first() {
        let mock = MockLlmClient::new()
            .with_tool_response("discover_codes", json!({"codes": ["fixed"]}))
            .push_tool_response("discover_codes", json!({"codes": ["queued"]}));
        let first = mock.chat_with_tool("s", "u", &tool()).await.unwrap();
        let second = mock.chat_with_tool("s", "u", &tool()).await.unwrap();
        assert_eq!(first.arguments, json!({"codes": ["queued"]}));
        assert_eq!(second.arguments, json!({"codes": ["fixed"]}));
    }

    #[tokio::test]
    async fn injected_failure_matches_prompt() {
        let mock = MockLlmClient::new()
            .with_tool_response("discover_codes", json!({}))
            .fail_when_prompt_contains("doc-3");
        assert!(mock.chat_with_tool("s", "text of doc-3", &tool()).await.is_err());
        assert!(mock.chat_with_tool("s", "text of doc-1", &tool()).await.is_ok());
    }

    #[tokio::test]
    async fn unscripted_tool_is_a_parse_error() {
        let mock = MockLlmClient::new();
        let err = mock.chat_with_tool("s", "u", &tool()).await.unwrap_err();
        assert!(matches!(err, CallError::Parse(_)));
    }
}
