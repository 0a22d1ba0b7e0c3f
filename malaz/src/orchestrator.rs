//! Orchestrator - the request/tools/answer protocol for one turn
//!
//! A turn is at most two engine calls:
//!
//! ```text
//! Init -> AwaitFirstDecision -> DirectAnswer ------------------------> Done
//!                            \-> DispatchTools -> AwaitFinalAnswer -> Done
//! ```
//!
//! The first call offers the whole tool catalogue. When it answers with tool
//! calls, each one is dispatched in the emitted order and answered with a
//! tool message carrying the call id; a second call without tools produces
//! the final answer. There is never a second dispatch round.

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message};
use crate::memory::ConversationMemory;
use crate::project::{format_context, load_project_structure};
use crate::prompts;
use crate::tools::{PathSandbox, ToolDispatcher, ToolInvocationResult};

/// Errors that abort a turn
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Reasoning engine error: {0}")]
    Llm(#[from] LlmError),
}

/// Protocol states of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Init,
    AwaitFirstDecision,
    DirectAnswer,
    DispatchTools,
    AwaitFinalAnswer,
    Done,
}

/// What a completed turn produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Final answer text, empty when the engine sent no content
    pub answer: String,

    /// Tool results in dispatch order; empty for a direct answer
    pub tool_results: Vec<ToolInvocationResult>,

    /// Phases visited, in order
    pub phases: Vec<TurnPhase>,
}

impl TurnOutcome {
    pub fn used_tools(&self) -> bool {
        !self.tool_results.is_empty()
    }
}

/// Runs turns against one engine and one project
pub struct Orchestrator {
    client: Arc<dyn LlmClient>,
    dispatcher: ToolDispatcher,
    project_context: String,
    system_prompt: String,
    max_tokens: u32,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn LlmClient>, dispatcher: ToolDispatcher, project_context: String, max_tokens: u32) -> Self {
        debug!(model = %client.model(), %max_tokens, "Orchestrator::new: called");
        let system_prompt = prompts::system_prompt(&project_context);
        Self {
            client,
            dispatcher,
            project_context,
            system_prompt,
            max_tokens,
        }
    }

    /// Summarize `project_root` and bind a dispatcher to it
    pub fn for_project(client: Arc<dyn LlmClient>, project_root: &Path, config: &Config) -> std::io::Result<Self> {
        debug!(?project_root, "Orchestrator::for_project: called");
        let sandbox = PathSandbox::new(project_root)?;
        let structure = load_project_structure(&sandbox);
        let context = format_context(&structure, config.project.max_context_files);
        info!(
            root = ?sandbox.root(),
            files = %structure.files.len(),
            "Orchestrator::for_project: project summarized"
        );
        let dispatcher = ToolDispatcher::new(sandbox, config.tools.clone());
        Ok(Self::new(client, dispatcher, context, config.llm.max_tokens))
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn project_context(&self) -> &str {
        &self.project_context
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Messages sent with the first call
    fn initial_messages(&self, input: &str, memory: &dyn ConversationMemory) -> Vec<Message> {
        let mut messages = vec![Message::system(&self.system_prompt)];
        let history = memory.get_context();
        if !history.is_empty() {
            debug!(history_len = %history.len(), "Orchestrator::initial_messages: including history");
            messages.push(Message::system(prompts::history_message(&history)));
        }
        messages.push(Message::user(input));
        messages
    }

    /// Run one turn and record it in `memory` on success
    ///
    /// A memory write failure is logged; the answer is still returned since
    /// the tool calls behind it have already run.
    pub async fn process_request(
        &self,
        input: &str,
        memory: &mut dyn ConversationMemory,
    ) -> Result<TurnOutcome, OrchestratorError> {
        debug!(input_len = %input.len(), "Orchestrator::process_request: called");
        let mut phases = vec![TurnPhase::Init];
        let mut messages = self.initial_messages(input, memory);

        phases.push(TurnPhase::AwaitFirstDecision);
        let request = CompletionRequest::new(messages.clone())
            .with_tools(self.dispatcher.definitions())
            .with_max_tokens(self.max_tokens);
        let response = self.client.complete(request).await?;
        debug!(
            stop_reason = ?response.stop_reason,
            tool_calls = %response.tool_calls.len(),
            "Orchestrator::process_request: first decision received"
        );

        let mut tool_results = Vec::new();
        let answer = if !response.has_tool_calls() {
            debug!("Orchestrator::process_request: direct answer");
            phases.push(TurnPhase::DirectAnswer);
            response.content.unwrap_or_default()
        } else {
            phases.push(TurnPhase::DispatchTools);
            messages.push(Message::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                info!(tool = %call.name, id = %call.id, "Orchestrator::process_request: dispatching tool call");
                let result = self.dispatcher.invoke_call(call).await;
                messages.push(result.to_message());
                tool_results.push(result);
            }

            phases.push(TurnPhase::AwaitFinalAnswer);
            let final_response = self.client.complete(CompletionRequest::new(messages)).await?;
            if final_response.has_tool_calls() {
                warn!(
                    count = %final_response.tool_calls.len(),
                    "Orchestrator::process_request: ignoring tool calls in final answer"
                );
            }
            final_response.content.unwrap_or_default()
        };

        if let Err(e) = memory.add_interaction(input, &answer) {
            warn!(error = %e, "Orchestrator::process_request: failed to record interaction");
        }
        phases.push(TurnPhase::Done);
        info!(tools = %tool_results.len(), "Orchestrator::process_request: turn complete");

        Ok(TurnOutcome {
            answer,
            tool_results,
            phases,
        })
    }
}
