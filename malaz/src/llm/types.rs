//! Reasoning-engine request/response types
//!
//! These types model a chat-completions style conversation: an ordered list of
//! role-tagged messages, an optional tool catalogue, and a response that is
//! either plain content or a list of tool calls. Provider clients translate
//! them to their own wire formats.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A completion request - everything needed for one engine call
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Ordered conversation, including system messages
    pub messages: Vec<Message>,

    /// Tools the engine may call (empty for the final-answer call)
    pub tools: Vec<ToolDefinition>,

    /// How the engine should choose tools; `None` omits the field
    pub tool_choice: Option<ToolChoice>,

    /// Response length cap; `None` leaves it to the client default
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Create a request carrying only messages
    pub fn new(messages: Vec<Message>) -> Self {
        debug!(message_count = %messages.len(), "CompletionRequest::new: called");
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Offer a tool catalogue with `tool_choice=auto`
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        debug!(tool_count = %tools.len(), "CompletionRequest::with_tools: called");
        self.tools = tools;
        self.tool_choice = Some(ToolChoice::Auto);
        self
    }

    /// Cap the response length
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// How the engine may pick tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    /// Text content; assistant messages that only call tools may have none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls emitted by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Originating call id for tool-role messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool name for tool-role messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn with_role(role: Role, text: String) -> Self {
        Self {
            role,
            content: Some(text),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        debug!("Message::system: called");
        Self::with_role(Role::System, text.into())
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        debug!("Message::user: called");
        Self::with_role(Role::User, text.into())
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        debug!("Message::assistant: called");
        Self::with_role(Role::Assistant, text.into())
    }

    /// Create an assistant message that requested tool calls
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        debug!(call_count = %tool_calls.len(), "Message::assistant_tool_calls: called");
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a tool-role message answering the call `tool_call_id`
    pub fn tool(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        debug!("Message::tool: called");
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }

    /// Text content, or an empty string
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Text content (if any)
    pub content: Option<String>,

    /// Tool calls requested by the engine, in emitted order
    pub tool_calls: Vec<ToolCall>,

    /// Why the engine stopped
    pub stop_reason: StopReason,

    /// Token usage
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// A plain text response
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    /// A response requesting tool calls
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A tool call requested by the engine
///
/// Arguments stay as the JSON text the engine produced; handlers parse them
/// at the point of use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the argument text; an empty string means no arguments
    pub fn parse_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        debug!(id = %self.id, name = %self.name, "ToolCall::parse_arguments: called");
        if self.arguments.trim().is_empty() {
            debug!("ToolCall::parse_arguments: empty arguments");
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&self.arguments)
    }
}

/// Why the engine stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    /// Parse from an OpenAI `finish_reason`
    pub fn from_openai(s: &str) -> Self {
        match s {
            "tool_calls" | "function_call" => StopReason::ToolUse,
            "length" => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        }
    }

    /// Parse from an Anthropic `stop_reason`
    pub fn from_anthropic(s: &str) -> Self {
        match s {
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Tool definition advertised to the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: serde_json::Value) -> Self {
        let name = name.into();
        let description = description.into();
        debug!(%name, "ToolDefinition::new: called");
        Self {
            name,
            description,
            input_schema,
        }
    }

    /// Convert to the OpenAI `{"type": "function", ...}` schema
    pub fn to_openai_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }

    /// Convert to the Anthropic tool schema
    pub fn to_anthropic_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.input_schema,
        })
    }
}
