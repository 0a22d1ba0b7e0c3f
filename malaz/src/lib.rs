//! Malaz - Sandboxed Tool-Calling Coding Agent
//!
//! Malaz turns a natural-language request into a bounded set of local
//! operations (file creation and edits, shell commands, code search) chosen by
//! an external reasoning engine. Every operation is confined to a single
//! project root.
//!
//! # Core Concepts
//!
//! - **One Dispatch Round**: A turn is at most two engine calls with one round of tools in between
//! - **Sandboxed Paths**: Every path a tool touches is resolved through [`tools::PathSandbox`]
//! - **Text Toward the Engine**: Tool failures are typed internally and rendered to text at the boundary
//! - **Injected Memory**: Conversation history is an owned [`memory::ConversationMemory`] object
//!
//! # Modules
//!
//! - [`llm`] - Reasoning-engine client trait with OpenAI and Anthropic implementations
//! - [`tools`] - Sandbox, sanitizer, executor, patch applier, registry and dispatcher
//! - [`orchestrator`] - The two-call request/tools/answer protocol
//! - [`memory`] - Bounded conversation history
//! - [`project`] - Project structure summarization for the system prompt
//! - [`repl`] - Interactive front end
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod analysis;
pub mod cli;
pub mod config;
pub mod debugger;
pub mod llm;
pub mod memory;
pub mod orchestrator;
pub mod project;
pub mod prompts;
pub mod repl;
pub mod review;
pub mod scaffold;
pub mod tools;
pub mod vcs;

// Re-export commonly used types
pub use config::{Config, LlmConfig, MemoryConfig, ToolsConfig};
pub use llm::{
    AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, OpenAIClient, Role, ToolCall,
    ToolChoice, ToolDefinition, create_client,
};
pub use memory::{ConversationMemory, MemoryError, SessionMemory};
pub use orchestrator::{Orchestrator, OrchestratorError, TurnOutcome, TurnPhase};
pub use project::{ProjectStructure, format_context, load_project_structure};
pub use tools::{
    CommandExecutor, CommandSanitizer, Patch, PatchApplier, PatchOutcome, PathSandbox, SandboxedPath, SecurityError,
    ShellCommandResult, ToolDispatcher, ToolError, ToolInvocationResult, ToolKind, ToolRegistry,
};
