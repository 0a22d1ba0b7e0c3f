//! OpenAI API client implementation
//!
//! Implements the LlmClient trait for OpenAI's Chat Completions API.

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

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenAIClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(provider = %config.provider, model = %config.model, "OpenAIClient::from_config: called");
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

    /// Build the request body for the OpenAI API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, ?request.max_tokens, "OpenAIClient::build_request_body: called");

        let messages: Vec<serde_json::Value> = request.messages.iter().map(convert_message).collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        if let Some(max_tokens) = request.max_tokens {
            // o1/o3 and gpt-5 models use max_completion_tokens instead of max_tokens
            let uses_completion_tokens =
                self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3");
            if uses_completion_tokens {
                body["max_completion_tokens"] = serde_json::json!(max_tokens);
            } else {
                body["max_tokens"] = serde_json::json!(max_tokens);
            }
        }

        if !request.tools.is_empty() {
            debug!("OpenAIClient::build_request_body: tools not empty, adding tools");
            body["tools"] = serde_json::json!(request.tools.iter().map(|t| t.to_openai_schema()).collect::<Vec<_>>());
            if let Some(choice) = request.tool_choice {
                body["tool_choice"] = serde_json::json!(choice.as_str());
            }
        } else {
            debug!("OpenAIClient::build_request_body: no tools");
        }

        body
    }

    /// Parse the OpenAI API response
    fn parse_response(&self, api_response: OpenAIResponse) -> CompletionResponse {
        debug!(choice_count = %api_response.choices.len(), "OpenAIClient::parse_response: called");
        let choice = api_response.choices.into_iter().next();

        let (content, tool_calls, stop_reason) = match choice {
            Some(c) => {
                let tool_calls = c
                    .message
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
                    .collect();
                let stop_reason = c
                    .finish_reason
                    .as_deref()
                    .map(StopReason::from_openai)
                    .unwrap_or(StopReason::EndTurn);
                (c.message.content, tool_calls, stop_reason)
            }
            None => {
                debug!("OpenAIClient::parse_response: no choices");
                (None, vec![], StopReason::EndTurn)
            }
        };

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        CompletionResponse {
            content,
            tool_calls,
            stop_reason,
            usage,
        }
    }
}

/// Convert one internal message to the chat-completions wire format
fn convert_message(msg: &Message) -> serde_json::Value {
    match msg.role {
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            "content": msg.text(),
        }),
        Role::Assistant if !msg.tool_calls.is_empty() => {
            let tool_calls: Vec<serde_json::Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments,
                        }
                    })
                })
                .collect();
            serde_json::json!({
                "role": "assistant",
                "content": msg.content,
                "tool_calls": tool_calls,
            })
        }
        role => serde_json::json!({
            "role": role.as_str(),
            "content": msg.text(),
        }),
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, message_count = %request.messages.len(), "OpenAIClient::complete: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "OpenAIClient::complete: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .http
                .post(url.clone())
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "OpenAIClient::complete: network error");
                    last_error = Some(LlmError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status == 429 {
                debug!("OpenAIClient::complete: rate limited (429)");
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
                debug!(attempt, status, "OpenAIClient::complete: retryable error");
                last_error = Some(LlmError::ApiError { status, message: text });
                continue;
            }

            if !response.status().is_success() {
                debug!(%status, "OpenAIClient::complete: API error");
                let text = response.text().await.unwrap_or_default();
                return Err(LlmError::ApiError { status, message: text });
            }

            debug!("OpenAIClient::complete: success");
            let api_response: OpenAIResponse = response.json().await?;
            return Ok(self.parse_response(api_response));
        }

        Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
