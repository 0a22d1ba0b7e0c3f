//! Parsing of REPL input lines

use tracing::debug;

use crate::tools::ToolDispatcher;
use crate::vcs::DEFAULT_COMMIT_MESSAGE;

pub const REVIEW_USAGE: &str = "Please specify file path: !review path/to/file.py";
pub const DEBUG_USAGE: &str = "Please provide error trace: !debug <trace>";

/// One classified line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Empty,
    Slash(SlashCommand),
    Shortcut(Shortcut),
    Request(String),
}

/// `/`-prefixed session commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Reset,
    Context,
    History,
    Tools,
    State,
    Exit,
    Unknown(String),
}

/// `!`-prefixed commands that run a collaborator without the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortcut {
    Review(Option<String>),
    Debug(Option<String>),
    Commit(String),
}

impl ReplInput {
    pub fn parse(line: &str) -> Self {
        let input = line.trim();
        if input.is_empty() {
            return ReplInput::Empty;
        }

        if let Some(rest) = input.strip_prefix('/') {
            let name = rest.split_whitespace().next().unwrap_or("").to_lowercase();
            debug!(%name, "ReplInput::parse: slash command");
            return ReplInput::Slash(SlashCommand::from_name(&name));
        }

        if input.starts_with('!') {
            let (head, tail) = match input.split_once(char::is_whitespace) {
                Some((head, tail)) => (head, Some(tail.trim()).filter(|t| !t.is_empty())),
                None => (input, None),
            };
            let shortcut = match head {
                "!review" => Some(Shortcut::Review(tail.map(str::to_string))),
                "!debug" => Some(Shortcut::Debug(tail.map(str::to_string))),
                "!commit" => Some(Shortcut::Commit(tail.unwrap_or(DEFAULT_COMMIT_MESSAGE).to_string())),
                _ => None,
            };
            if let Some(shortcut) = shortcut {
                debug!(?shortcut, "ReplInput::parse: shortcut");
                return ReplInput::Shortcut(shortcut);
            }
        }

        ReplInput::Request(input.to_string())
    }
}

impl SlashCommand {
    fn from_name(name: &str) -> Self {
        match name {
            "help" => SlashCommand::Help,
            "reset" => SlashCommand::Reset,
            "context" => SlashCommand::Context,
            "history" => SlashCommand::History,
            "tools" => SlashCommand::Tools,
            "state" => SlashCommand::State,
            "exit" | "quit" => SlashCommand::Exit,
            other => SlashCommand::Unknown(other.to_string()),
        }
    }
}

impl Shortcut {
    /// Run the collaborator and render its result as text
    pub async fn run(&self, dispatcher: &ToolDispatcher) -> String {
        debug!(shortcut = ?self, "Shortcut::run: called");
        let result = match self {
            Shortcut::Review(None) => return REVIEW_USAGE.to_string(),
            Shortcut::Debug(None) => return DEBUG_USAGE.to_string(),
            Shortcut::Review(Some(path)) => dispatcher.code_review(path),
            Shortcut::Debug(Some(trace)) => Ok(dispatcher.auto_debug(trace)),
            Shortcut::Commit(message) => dispatcher.vcs_commit(message).await,
        };
        result.unwrap_or_else(|e| e.render())
    }
}
