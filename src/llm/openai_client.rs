//! OpenAI Client
//!
//! LLM client implementation for the OpenAI chat completions API.

use async_trait::async_trait;
use serde::Deserialize;

use super::llm_client::{LlmClient, ToolCallResult, ToolDefinition};
use crate::error::{CallError, CallResult};

/// Default OpenAI model
const DEFAULT_MODEL: &str = "gpt-4o";

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
}

impl OpenAiClient {
    /// Create a new OpenAI client with the given API key
    pub fn new(api_key: String) -> Self {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
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
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    async fn post(&self, body: serde_json::Value) -> CallResult<serde_json::Value> {
        let response = self
            .client
            .post(API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Api { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| CallError::Parse(format!("OpenAI response body: {}", e)))
    }

    /// Internal API call implementation
    async fn call_api(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        json_mode: bool,
    ) -> CallResult<String> {
        let mut body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0.1
        });
        if json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        let raw = self.post(body).await?;

        if raw["choices"][0]["finish_reason"].as_str() == Some("length") {
            return Err(CallError::Truncated("length".to_string()));
        }

        raw["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(CallError::Empty)
    }

    /// Internal API call with function_calling for structured output
    async fn call_api_with_tool(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> CallResult<ToolCallResult> {
        let raw = self
            .post(serde_json::json!({
                "model": &self.model,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_prompt}
                ],
                "temperature": 0.1,
                "functions": [{
                    "name": &tool.name,
                    "description": &tool.description,
                    "parameters": &tool.parameters
                }],
                "function_call": {"name": &tool.name}
            }))
            .await?;

        if raw["choices"][0]["finish_reason"].as_str() == Some("length") {
            return Err(CallError::Truncated("length".to_string()));
        }

        #[derive(Deserialize)]
        struct FunctionCall {
            name: String,
            arguments: String, // OpenAI returns arguments as a JSON string
        }

        let function_call: FunctionCall = serde_json::from_value(
            raw["choices"][0]["message"]["function_call"].clone(),
        )
        .map_err(|e| CallError::Parse(format!("no function_call in OpenAI response: {}", e)))?;

        tracing::debug!(arguments = %function_call.arguments, "OpenAI function_call");

        let arguments: serde_json::Value = serde_json::from_str(&function_call.arguments)
            .map_err(|e| CallError::Parse(format!("function arguments: {}", e)))?;

        Ok(ToolCallResult {
            tool_name: function_call.name,
            arguments,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> CallResult<String> {
        self.call_api(system_prompt, user_prompt, false).await
    }

    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> CallResult<String> {
        self.call_api(system_prompt, user_prompt, true).await
    }

    async fn chat_with_tool(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> CallResult<ToolCallResult> {
        self.call_api_with_tool(system_prompt, user_prompt, tool)
            .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_model() {
        let client = OpenAiClient::with_model("test-key".to_string(), "gpt-4o-mini");
        assert_eq!(client.model_name(), "gpt-4o-mini");
        assert_eq!(client.provider_name(), "OpenAI");
    }
}
