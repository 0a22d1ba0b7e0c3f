//! Anthropic Claude API client implementation
//!
//! Implements the LlmClient trait for Anthropic's Messages API. System
//! messages are lifted into the top-level `system` field and consecutive tool
//! results are grouped into one user turn of `tool_result` blocks.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, Role, StopReason, TokenUsage, ToolCall};
use crate::config::LlmConfig;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// The Messages API requires max_tokens on every request
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 529)
}

/// Anthropic Claude API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
}

impl AnthropicClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(provider = %config.provider, model = %config.model, "AnthropicClient::from_config: called");
        let api_key = config
            .get_api_key()
            .map_err(|_| LlmError::MissingApiKey(config.api_key_env.clone()))?;

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Build the request body for the Anthropic API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, ?request.max_tokens, "AnthropicClient::build_request_body: called");

        let system = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": convert_messages(&request.messages, !request.tools.is_empty()),
        });

        if !system.is_empty() {
            body["system"] = serde_json::json!(system);
        }

        if !request.tools.is_empty() {
            debug!("AnthropicClient::build_request_body: tools not empty, adding tools");
            body["tools"] = serde_json::json!(
                request
                    .tools
                    .iter()
                    .map(|t| t.to_anthropic_schema())
                    .collect::<Vec<_>>()
            );
            if let Some(choice) = request.tool_choice {
                body["tool_choice"] = serde_json::json!({ "type": choice.as_str() });
            }
        } else {
            debug!("AnthropicClient::build_request_body: no tools");
        }

        body
    }

    /// Parse the Anthropic API response
    fn parse_response(&self, api_response: AnthropicResponse) -> CompletionResponse {
        debug!(?api_response.stop_reason, "AnthropicClient::parse_response: called");
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in api_response.content {
            match block {
                AnthropicContentBlock::Text { text: t } => {
                    debug!("AnthropicClient::parse_response: Text block");
                    text.push_str(&t);
                }
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    debug!(%id, %name, "AnthropicClient::parse_response: ToolUse block");
                    tool_calls.push(ToolCall::new(id, name, input.to_string()));
                }
                AnthropicContentBlock::Other => {
                    debug!("AnthropicClient::parse_response: ignoring unknown block");
                }
            }
        }

        CompletionResponse {
            content: if text.is_empty() { None } else { Some(text) },
            tool_calls,
            stop_reason: api_response
                .stop_reason
                .as_deref()
                .map(StopReason::from_anthropic)
                .unwrap_or(StopReason::EndTurn),
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        }
    }
}

/// Convert the non-system messages to Anthropic turns
///
/// The API rejects `tool_use` and `tool_result` blocks in a request without
/// `tools`, so when `with_tool_blocks` is false earlier tool calls and their
/// results are rendered as plain text turns instead.
fn convert_messages(messages: &[Message], with_tool_blocks: bool) -> Vec<serde_json::Value> {
    debug!(message_count = %messages.len(), %with_tool_blocks, "convert_messages: called");
    let mut result: Vec<serde_json::Value> = Vec::new();
    let mut pending_results: Vec<&Message> = Vec::new();

    for msg in messages {
        if msg.role == Role::Tool {
            pending_results.push(msg);
            continue;
        }

        if !pending_results.is_empty() {
            result.push(tool_results_turn(&pending_results, with_tool_blocks));
            pending_results.clear();
        }

        match msg.role {
            Role::System => {}
            Role::Assistant if !msg.tool_calls.is_empty() => {
                result.push(assistant_tool_turn(msg, with_tool_blocks));
            }
            role => {
                result.push(serde_json::json!({ "role": role.as_str(), "content": msg.text() }));
            }
        }
    }

    if !pending_results.is_empty() {
        result.push(tool_results_turn(&pending_results, with_tool_blocks));
    }

    result
}

fn assistant_tool_turn(msg: &Message, with_tool_blocks: bool) -> serde_json::Value {
    let text = msg.content.as_deref().filter(|t| !t.is_empty());

    if !with_tool_blocks {
        debug!("assistant_tool_turn: rendering tool calls as text");
        let mut lines: Vec<String> = text.map(str::to_string).into_iter().collect();
        for tc in &msg.tool_calls {
            lines.push(format!("[Called tool {} ({}) with arguments {}]", tc.name, tc.id, tc.arguments));
        }
        return serde_json::json!({ "role": "assistant", "content": lines.join("\n") });
    }

    let mut blocks = Vec::new();
    if let Some(text) = text {
        blocks.push(serde_json::json!({ "type": "text", "text": text }));
    }
    for tc in &msg.tool_calls {
        let input = tc.parse_arguments().unwrap_or_else(|_| serde_json::json!({}));
        blocks.push(serde_json::json!({
            "type": "tool_use",
            "id": tc.id,
            "name": tc.name,
            "input": input,
        }));
    }
    serde_json::json!({ "role": "assistant", "content": blocks })
}

/// One user turn answering a run of consecutive tool messages
fn tool_results_turn(results: &[&Message], with_tool_blocks: bool) -> serde_json::Value {
    if !with_tool_blocks {
        debug!(count = %results.len(), "tool_results_turn: rendering tool results as text");
        let text = results
            .iter()
            .map(|m| {
                format!(
                    "[Result of tool {} ({})]\n{}",
                    m.name.as_deref().unwrap_or("unknown"),
                    m.tool_call_id.as_deref().unwrap_or_default(),
                    m.text()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        return serde_json::json!({ "role": "user", "content": text });
    }

    let blocks: Vec<serde_json::Value> = results
        .iter()
        .map(|m| {
            serde_json::json!({
                "type": "tool_result",
                "tool_use_id": m.tool_call_id.clone().unwrap_or_default(),
                "content": m.text(),
            })
        })
        .collect();
    serde_json::json!({ "role": "user", "content": blocks })
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, message_count = %request.messages.len(), "AnthropicClient::complete: called");
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "AnthropicClient::complete: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .http
                .post(url.clone())
                .header("x-api-key", self.api_key.clone())
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "AnthropicClient::complete: network error");
                    last_error = Some(LlmError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status == 429 {
                debug!("AnthropicClient::complete: rate limited (429)");
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);

                return Err(LlmError::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                });
            }

            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let text = response.text().await.unwrap_or_default();
                debug!(attempt, status, "AnthropicClient::complete: retryable error");
                last_error = Some(LlmError::ApiError { status, message: text });
                continue;
            }

            if !response.status().is_success() {
                debug!(%status, "AnthropicClient::complete: API error");
                let text = response.text().await.unwrap_or_default();
                return Err(LlmError::ApiError { status, message: text });
            }

            debug!("AnthropicClient::complete: success");
            let api_response: AnthropicResponse = response.json().await?;
            return Ok(self.parse_response(api_response));
        }

        Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Anthropic API response types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}
