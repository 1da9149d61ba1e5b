//! LLM backend layer
//!
//! Unified client trait over Anthropic and OpenAI with forced structured
//! output, plus the schema-validating, retrying [`StructuredExtractor`] that
//! the discovery and application phases call through. A deterministic
//! [`MockLlmClient`] ships here for harnesses and tests.

pub mod anthropic_client;
pub mod backend;
pub mod client_factory;
pub mod extractor;
pub mod llm_client;
pub mod mock;
pub mod openai_client;

pub use anthropic_client::AnthropicClient;
pub use backend::AgentBackend;
pub use client_factory::{create_llm_client, create_llm_client_with_key};
pub use extractor::{ExtractorConfig, StructuredExtractor};
pub use llm_client::{LlmClient, ToolCallResult, ToolDefinition};
pub use mock::MockLlmClient;
pub use openai_client::OpenAiClient;
