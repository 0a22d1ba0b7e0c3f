//! Reasoning-engine client module
//!
//! Provides the `LlmClient` trait, the request/response types and the
//! provider implementations.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod openai;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{
    CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage, ToolCall, ToolChoice, ToolDefinition,
};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Supports "openai" and "anthropic" providers.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "openai" => {
            debug!("create_client: creating OpenAI client");
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::UnknownProvider(other.to_string()))
        }
    }
}
