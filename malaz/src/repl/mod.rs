//! Interactive front end
//!
//! A `rustyline` loop over one [`Orchestrator`]. Slash commands inspect the
//! session, `!review`/`!debug`/`!commit` run their collaborator directly,
//! and any other line is a normal turn.

mod commands;
mod session;

pub use commands::{DEBUG_USAGE, REVIEW_USAGE, ReplInput, Shortcut, SlashCommand};
pub use session::ReplSession;

use std::path::Path;
use std::sync::Arc;

use eyre::{Context, Result};
use tracing::debug;

use crate::config::Config;
use crate::llm::LlmClient;
use crate::memory::SessionMemory;
use crate::orchestrator::Orchestrator;

/// Build a session for `project_root` with file-backed memory
///
/// The memory file path is resolved through the project sandbox.
pub fn build_session(config: &Config, client: Arc<dyn LlmClient>, project_root: &Path) -> Result<ReplSession> {
    debug!(?project_root, "build_session: called");
    let orchestrator =
        Orchestrator::for_project(client, project_root, config).context("Failed to open project directory")?;

    let memory_path = orchestrator
        .dispatcher()
        .sandbox()
        .resolve(&config.memory.file)
        .context("Invalid memory file location")?;
    let memory = SessionMemory::load(
        memory_path.into_path_buf(),
        config.memory.max_history,
        config.memory.context_word_budget,
    );

    Ok(ReplSession::new(orchestrator, Box::new(memory)))
}

/// Run one request, or the interactive loop when there is none
pub async fn run(config: &Config, client: Arc<dyn LlmClient>, project_root: &Path, request: Option<String>) -> Result<()> {
    let mut session = build_session(config, client, project_root)?;
    match request {
        Some(request) => {
            debug!("run: one-shot request");
            session.run_once(&request).await
        }
        None => {
            debug!("run: interactive session");
            session.run().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::CompletionResponse;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_build_session_persists_memory_in_project() {
        let temp = tempdir().unwrap();
        let client = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("ok")]));

        let mut session = build_session(&Config::default(), client, temp.path()).unwrap();
        session.respond("hello").await.unwrap();

        assert!(temp.path().join("malaz_memory.json").is_file());
    }

    #[test]
    fn test_memory_file_outside_project_is_rejected() {
        let temp = tempdir().unwrap();
        let client = Arc::new(MockLlmClient::new(vec![]));
        let mut config = Config::default();
        config.memory.file = "../escape.json".to_string();

        assert!(build_session(&config, client, temp.path()).is_err());
    }
}
