//! Structured extractor
//!
//! Wraps an [`LlmClient`] with the call contract the pipeline relies on:
//! one logical operation that, given a prompt and an expected result schema,
//! returns either a schema-validated structured result or an explicit tagged
//! error. Retryable failures get a bounded retry with exponential backoff;
//! truncation and refusals surface immediately.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::llm_client::{LlmClient, ToolDefinition};
use crate::error::{CallError, CallResult};

/// Retry/backoff/timeout settings for one extractor.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Total attempts per call (first try included).
    pub max_attempts: usize,
    /// Backoff before retry n is `base_backoff * 2^(n-1)`.
    pub base_backoff: Duration,
    /// Wall-clock budget per individual backend call.
    pub call_timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            call_timeout: Duration::from_secs(120),
        }
    }
}

/// Schema-validating, retrying front end to the extraction backend.
pub struct StructuredExtractor {
    client: Arc<dyn LlmClient>,
    config: ExtractorConfig,
}

impl StructuredExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            config: ExtractorConfig::default(),
        }
    }

    pub fn with_config(client: Arc<dyn LlmClient>, config: ExtractorConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &Arc<dyn LlmClient> {
        &self.client
    }

    /// One logical structured-output call.
    ///
    /// The returned value is guaranteed to validate against
    /// `tool.parameters`; a response that does not is a
    /// [`CallError::SchemaViolation`] and is retried like any other
    /// malformed output.
    pub async fn extract(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> CallResult<serde_json::Value> {
        let validator = jsonschema::validator_for(&tool.parameters)
            .map_err(|e| CallError::SchemaViolation(format!("invalid tool schema: {}", e)))?;

        let mut last_error: Option<CallError> = None;
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                let backoff = self.config.base_backoff * 2u32.pow((attempt - 2) as u32);
                debug!(tool = %tool.name, attempt, ?backoff, "retrying backend call");
                tokio::time::sleep(backoff).await;
            }

            match self.attempt(system_prompt, user_prompt, tool, &validator).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    warn!(tool = %tool.name, attempt, error = %err, "backend call failed, will retry");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or(CallError::Empty))
    }

    async fn attempt(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
        validator: &jsonschema::Validator,
    ) -> CallResult<serde_json::Value> {
        let call = self.client.chat_with_tool(system_prompt, user_prompt, tool);
        let result = tokio::time::timeout(self.config.call_timeout, call)
            .await
            .map_err(|_| CallError::Timeout(self.config.call_timeout))??;

        let violations: Vec<String> = validator
            .iter_errors(&result.arguments)
            .map(|e| e.to_string())
            .collect();
        if !violations.is_empty() {
            return Err(CallError::SchemaViolation(violations.join("; ")));
        }

        Ok(result.arguments)
    }
}
