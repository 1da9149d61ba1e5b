//! Client Factory
//!
//! Creates the right LLM client implementation for the selected backend.

use std::sync::Arc;

use anyhow::Result;

use super::anthropic_client::AnthropicClient;
use super::backend::AgentBackend;
use super::llm_client::LlmClient;
use super::openai_client::OpenAiClient;

/// Create an LLM client from environment variables.
///
/// Backend selection via AGENT_BACKEND; credentials via the backend's own
/// key variable (ANTHROPIC_API_KEY / OPENAI_API_KEY).
pub fn create_llm_client() -> Result<Arc<dyn LlmClient>> {
    let backend = AgentBackend::from_env()?;
    let client: Arc<dyn LlmClient> = match backend {
        AgentBackend::Anthropic => Arc::new(AnthropicClient::from_env()?),
        AgentBackend::OpenAi => Arc::new(OpenAiClient::from_env()?),
    };
    tracing::info!(
        provider = client.provider_name(),
        model = client.model_name(),
        "created LLM client"
    );
    Ok(client)
}

/// Create an LLM client for an explicit backend with an explicit key.
pub fn create_llm_client_with_key(
    backend: AgentBackend,
    api_key: String,
) -> Arc<dyn LlmClient> {
    match backend {
        AgentBackend::Anthropic => Arc::new(AnthropicClient::new(api_key)),
        AgentBackend::OpenAi => Arc::new(OpenAiClient::new(api_key)),
    }
}
