//! Anthropic Client
//!
//! LLM client implementation for Anthropic Claude API.

use async_trait::async_trait;
use serde::Deserialize;

use super::llm_client::{LlmClient, ToolCallResult, ToolDefinition};
use crate::error::{CallError, CallResult};

/// Default Anthropic model
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
    name: Option<String>,
    input: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

/// Anthropic Claude API client
#[derive(Clone)]
pub struct AnthropicClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
}

impl AnthropicClient {
    /// Create a new Anthropic client with the given API key
    pub fn new(api_key: String) -> Self {
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self {
            api_key,
            client: reqwest::Client::new(),
            model,
        }
    }

    /// Create with a specific model
    pub fn with_model(api_key: String, model: &str) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            model: model.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    async fn post(&self, body: serde_json::Value) -> CallResult<ApiResponse> {
        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Api { status, body });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| CallError::Parse(format!("Anthropic response body: {}", e)))?;

        // Truncation must surface as an explicit error, never be masked
        // with partial data.
        if api_response.stop_reason.as_deref() == Some("max_tokens") {
            return Err(CallError::Truncated("max_tokens".to_string()));
        }
        if api_response.stop_reason.as_deref() == Some("refusal") {
            return Err(CallError::Refusal("model declined the request".to_string()));
        }

        Ok(api_response)
    }

    /// Internal API call implementation
    async fn call_api(&self, system_prompt: &str, user_prompt: &str) -> CallResult<String> {
        let api_response = self
            .post(serde_json::json!({
                "model": &self.model,
                "max_tokens": MAX_TOKENS,
                "system": system_prompt,
                "messages": [{"role": "user", "content": user_prompt}]
            }))
            .await?;

        api_response
            .content
            .iter()
            .find(|c| c.block_type == "text")
            .and_then(|c| c.text.clone())
            .ok_or(CallError::Empty)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> CallResult<String> {
        self.call_api(system_prompt, user_prompt).await
    }

    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> CallResult<String> {
        // Anthropic doesn't have json_object mode, rely on prompt engineering
        let json_system = format!(
            "{}\n\nIMPORTANT: Respond with valid JSON only. No markdown code blocks, no explanations.",
            system_prompt
        );
        self.call_api(&json_system, user_prompt).await
    }

    async fn chat_with_tool(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> CallResult<ToolCallResult> {
        let api_response = self
            .post(serde_json::json!({
                "model": &self.model,
                "max_tokens": MAX_TOKENS,
                "system": system_prompt,
                "messages": [{"role": "user", "content": user_prompt}],
                "tools": [{
                    "name": &tool.name,
                    "description": &tool.description,
                    "input_schema": &tool.parameters
                }],
                "tool_choice": {"type": "tool", "name": &tool.name}
            }))
            .await?;

        let block = api_response
            .content
            .iter()
            .find(|c| c.block_type == "tool_use")
            .ok_or_else(|| CallError::Parse("no tool_use block in Anthropic response".into()))?;

        let arguments = block
            .input
            .clone()
            .ok_or_else(|| CallError::Parse("tool_use block has no input".into()))?;

        Ok(ToolCallResult {
            tool_name: block.name.clone().unwrap_or_else(|| tool.name.clone()),
            arguments,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "Anthropic"
    }
}
