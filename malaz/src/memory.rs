//! Conversation memory
//!
//! A bounded list of (request, answer) pairs that feeds the second system
//! message of every turn. The Orchestrator only sees the
//! [`ConversationMemory`] trait; [`SessionMemory`] is the stock
//! implementation, optionally persisted to a JSON file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default number of retained interactions
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Default whitespace-word budget of the rendered context
pub const DEFAULT_WORD_BUDGET: usize = 2000;

/// Errors from persisting conversation memory
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Failed to write memory file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize memory: {0}")]
    Json(#[from] serde_json::Error),
}

/// One recorded turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// RFC 3339 local time of the turn
    pub timestamp: String,
    pub user: String,
    pub agent: String,
}

impl Interaction {
    pub fn new(user: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            user: user.into(),
            agent: agent.into(),
        }
    }

    fn render(&self) -> String {
        format!("User: {}\nAgent: {}\n", self.user, self.agent)
    }
}

/// History source injected into the Orchestrator
pub trait ConversationMemory: Send {
    /// Recent history rendered for the prompt; empty when there is none
    fn get_context(&self) -> String;

    /// Record a completed turn
    fn add_interaction(&mut self, user: &str, agent: &str) -> Result<(), MemoryError>;

    /// Forget every interaction
    fn reset(&mut self) -> Result<(), MemoryError>;

    /// Retained interactions, oldest first
    fn history(&self) -> &[Interaction];
}

/// On-disk layout of the memory file
#[derive(Debug, Serialize, Deserialize)]
struct MemoryFile {
    session_id: String,
    #[serde(default)]
    history: Vec<Interaction>,
}

/// Bounded history, persisted after every mutation when file-backed
#[derive(Debug, Clone)]
pub struct SessionMemory {
    session_id: String,
    history: Vec<Interaction>,
    max_history: usize,
    word_budget: usize,
    file: Option<PathBuf>,
}

impl SessionMemory {
    /// Memory with no backing file
    pub fn in_memory() -> Self {
        Self::with_limits(DEFAULT_MAX_HISTORY, DEFAULT_WORD_BUDGET)
    }

    /// Memory with no backing file and explicit limits
    pub fn with_limits(max_history: usize, word_budget: usize) -> Self {
        Self {
            session_id: Uuid::now_v7().to_string(),
            history: Vec::new(),
            max_history,
            word_budget,
            file: None,
        }
    }

    /// Memory backed by `path`
    ///
    /// A missing file starts an empty session; an unreadable or malformed
    /// one is logged and ignored, and is overwritten on the next mutation.
    pub fn load(path: impl Into<PathBuf>, max_history: usize, word_budget: usize) -> Self {
        let path = path.into();
        debug!(?path, %max_history, %word_budget, "SessionMemory::load: called");
        let mut memory = Self::with_limits(max_history, word_budget);

        if path.exists() {
            match read_memory_file(&path) {
                Ok(stored) => {
                    info!(?path, entries = %stored.history.len(), "SessionMemory::load: restored history");
                    memory.session_id = stored.session_id;
                    memory.history = stored.history;
                    memory.truncate();
                }
                Err(e) => {
                    warn!(?path, error = %e, "SessionMemory::load: ignoring unreadable memory file");
                }
            }
        } else {
            debug!(?path, "SessionMemory::load: no memory file, starting empty");
        }

        memory.file = Some(path);
        memory
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    fn truncate(&mut self) {
        if self.history.len() > self.max_history {
            let excess = self.history.len() - self.max_history;
            debug!(%excess, "SessionMemory::truncate: dropping oldest interactions");
            self.history.drain(..excess);
        }
    }

    fn save(&self) -> Result<(), MemoryError> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        debug!(?path, entries = %self.history.len(), "SessionMemory::save: called");

        let stored = MemoryFile {
            session_id: self.session_id.clone(),
            history: self.history.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)?;
        std::fs::write(path, json).map_err(|source| MemoryError::Io {
            path: path.clone(),
            source,
        })
    }
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ConversationMemory for SessionMemory {
    /// Newest interactions that fit the word budget, in chronological order
    fn get_context(&self) -> String {
        let mut entries = Vec::new();
        let mut words = 0;

        for interaction in self.history.iter().rev() {
            let entry = interaction.render();
            let entry_words = entry.split_whitespace().count();
            if words + entry_words > self.word_budget {
                debug!(%words, %entry_words, "SessionMemory::get_context: word budget reached");
                break;
            }
            words += entry_words;
            entries.push(entry);
        }

        entries.reverse();
        entries.concat().trim().to_string()
    }

    fn add_interaction(&mut self, user: &str, agent: &str) -> Result<(), MemoryError> {
        debug!(user_len = %user.len(), agent_len = %agent.len(), "SessionMemory::add_interaction: called");
        self.history.push(Interaction::new(user, agent));
        self.truncate();
        self.save()
    }

    fn reset(&mut self) -> Result<(), MemoryError> {
        debug!("SessionMemory::reset: called");
        self.history.clear();
        self.save()
    }

    fn history(&self) -> &[Interaction] {
        &self.history
    }
}

fn read_memory_file(path: &Path) -> eyre::Result<MemoryFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_context() {
        let memory = SessionMemory::in_memory();
        assert_eq!(memory.get_context(), "");
        assert!(memory.history().is_empty());
    }

    #[test]
    fn test_context_is_chronological() {
        let mut memory = SessionMemory::in_memory();
        memory.add_interaction("first", "one").unwrap();
        memory.add_interaction("second", "two").unwrap();

        assert_eq!(memory.get_context(), "User: first\nAgent: one\nUser: second\nAgent: two");
    }

    #[test]
    fn test_oldest_dropped_beyond_max_history() {
        let mut memory = SessionMemory::with_limits(2, DEFAULT_WORD_BUDGET);
        memory.add_interaction("a", "1").unwrap();
        memory.add_interaction("b", "2").unwrap();
        memory.add_interaction("c", "3").unwrap();

        let users: Vec<_> = memory.history().iter().map(|i| i.user.as_str()).collect();
        assert_eq!(users, vec!["b", "c"]);
    }

    #[test]
    fn test_word_budget_keeps_newest() {
        // each entry is "User: x\nAgent: y\n" = 4 words
        let mut memory = SessionMemory::with_limits(10, 9);
        memory.add_interaction("old", "reply").unwrap();
        memory.add_interaction("mid", "reply").unwrap();
        memory.add_interaction("new", "reply").unwrap();

        assert_eq!(memory.get_context(), "User: mid\nAgent: reply\nUser: new\nAgent: reply");
    }

    #[test]
    fn test_entry_over_budget_yields_empty_context() {
        let mut memory = SessionMemory::with_limits(10, 3);
        memory.add_interaction("hello", "world").unwrap();
        assert_eq!(memory.get_context(), "");
    }

    #[test]
    fn test_timestamps_are_rfc3339() {
        let mut memory = SessionMemory::in_memory();
        memory.add_interaction("q", "a").unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&memory.history()[0].timestamp).is_ok());
    }

    #[test]
    fn test_persist_and_reload() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("malaz_memory.json");

        let mut memory = SessionMemory::load(&path, 20, 2000);
        memory.add_interaction("make a file", "done").unwrap();
        let session_id = memory.session_id().to_string();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["session_id"], session_id.as_str());
        assert_eq!(raw["history"][0]["user"], "make a file");
        assert_eq!(raw["history"][0]["agent"], "done");

        let reloaded = SessionMemory::load(&path, 20, 2000);
        assert_eq!(reloaded.session_id(), session_id);
        assert_eq!(reloaded.history().len(), 1);
    }

    #[test]
    fn test_reset_persists_empty_history() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("memory.json");

        let mut memory = SessionMemory::load(&path, 20, 2000);
        memory.add_interaction("q", "a").unwrap();
        memory.reset().unwrap();

        assert!(memory.history().is_empty());
        assert!(SessionMemory::load(&path, 20, 2000).history().is_empty());
    }

    #[test]
    fn test_malformed_file_is_ignored() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("memory.json");
        std::fs::write(&path, "{not json").unwrap();

        let memory = SessionMemory::load(&path, 20, 2000);
        assert!(memory.history().is_empty());
        assert_eq!(memory.file(), Some(path.as_path()));
    }

    #[test]
    fn test_reload_truncates_to_max_history() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("memory.json");

        let mut memory = SessionMemory::load(&path, 20, 2000);
        for i in 0..5 {
            memory.add_interaction(&format!("q{}", i), "a").unwrap();
        }

        let reloaded = SessionMemory::load(&path, 2, 2000);
        let users: Vec<_> = reloaded.history().iter().map(|i| i.user.as_str()).collect();
        assert_eq!(users, vec!["q3", "q4"]);
    }
}
