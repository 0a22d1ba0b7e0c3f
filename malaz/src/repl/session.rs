//! REPL session management

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info, warn};

use super::commands::{ReplInput, SlashCommand};
use crate::memory::ConversationMemory;
use crate::orchestrator::{Orchestrator, OrchestratorError};

const PROMPT: &str = "malaz> ";

/// Interactive session over one orchestrator and one memory
pub struct ReplSession {
    orchestrator: Orchestrator,
    memory: Box<dyn ConversationMemory>,
}

impl ReplSession {
    pub fn new(orchestrator: Orchestrator, memory: Box<dyn ConversationMemory>) -> Self {
        debug!(model = %orchestrator.model(), "ReplSession::new: called");
        Self { orchestrator, memory }
    }

    pub fn memory(&self) -> &dyn ConversationMemory {
        self.memory.as_ref()
    }

    /// Answer one line of input that is not a slash command
    ///
    /// Shortcuts run their collaborator directly; anything else is a turn.
    pub async fn respond(&mut self, input: &str) -> Result<String> {
        debug!(%input, "ReplSession::respond: called");
        match ReplInput::parse(input) {
            ReplInput::Shortcut(shortcut) => Ok(shortcut.run(self.orchestrator.dispatcher()).await),
            ReplInput::Empty => Ok(String::new()),
            _ => {
                let outcome = self.orchestrator.process_request(input.trim(), self.memory.as_mut()).await?;
                Ok(outcome.answer)
            }
        }
    }

    /// Run a single request and print the answer
    pub async fn run_once(&mut self, request: &str) -> Result<()> {
        info!(%request, "ReplSession::run_once: called");
        println!("{} {}", "Executing:".bright_cyan().bold(), request);
        let answer = self.respond(request).await?;
        println!("\n{}\n", answer.bright_green());
        Ok(())
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{}", PROMPT.bright_cyan().bold()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    if let ReplInput::Slash(command) = ReplInput::parse(input) {
                        match self.handle_slash_command(command) {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    }

                    match self.respond(input).await {
                        Ok(answer) => println!("\n{}\n", answer.bright_green()),
                        Err(e) => {
                            warn!(error = %e, "ReplSession::run: turn failed");
                            println!("{} {}", "Error:".red().bold(), e);
                            if let Some(hint) = error_hint(&e) {
                                println!("{}", hint.yellow());
                            }
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("\n{}", "Session interrupted. Type /exit to quit".yellow());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!("{}", "Malaz - AI Coding Agent".bright_green().bold());
        println!("{}", "Welcome to Malaz AI Agent!".bright_magenta().bold());
        println!(
            "Type {} for commands, {} for code review, {} to save changes",
            "/help".yellow(),
            "!review <file>".yellow(),
            "!commit".yellow()
        );
        println!("Type {} to quit\n", "/exit".yellow());
    }

    fn handle_slash_command(&mut self, command: SlashCommand) -> SlashResult {
        debug!(?command, "ReplSession::handle_slash_command: called");
        match command {
            SlashCommand::Help => self.print_help(),
            SlashCommand::Reset => match self.memory.reset() {
                Ok(()) => println!("{}", "Session memory has been reset".green()),
                Err(e) => println!("{} {}", "Error:".red().bold(), e),
            },
            SlashCommand::Context => {
                println!("{}\n{}", "Project Context:".bold(), self.orchestrator.project_context());
            }
            SlashCommand::History => self.print_history(),
            SlashCommand::Tools => {
                println!("{}", "Available Tools:".bold());
                for (name, description) in self.orchestrator.dispatcher().registry().list() {
                    println!("- {}: {}", name.yellow(), description);
                }
            }
            SlashCommand::State => {
                println!(
                    "{} {}",
                    "Project Path:".bold(),
                    self.orchestrator.dispatcher().sandbox().root().display()
                );
                println!("{} {}", "Model:".bold(), self.orchestrator.model());
                println!("{} {}", "History entries:".bold(), self.memory.history().len());
                println!("{}\n{}", "Context:".bold(), self.orchestrator.project_context());
            }
            SlashCommand::Exit => return SlashResult::Quit,
            SlashCommand::Unknown(name) => println!("{}", format!("Unknown command: {}", name).red()),
        }
        SlashResult::Continue
    }

    fn print_help(&self) {
        println!("{}", "Available Commands:".bold());
        println!("  {:16} Show this help", "/help".yellow());
        println!("  {:16} Reset session memory", "/reset".yellow());
        println!("  {:16} Show project context", "/context".yellow());
        println!("  {:16} Show conversation history", "/history".yellow());
        println!("  {:16} List available tools", "/tools".yellow());
        println!("  {:16} Show current project state", "/state".yellow());
        println!("  {:16} Exit the program", "/exit".yellow());
        println!("  {:16} Review a file", "!review <file>".yellow());
        println!("  {:16} Analyze a traceback", "!debug <trace>".yellow());
        println!("  {:16} Commit all changes", "!commit [msg]".yellow());
    }

    fn print_history(&self) {
        let history = self.memory.history();
        if history.is_empty() {
            println!("{}", "No conversation history.".dimmed());
            return;
        }

        println!("{}", "Conversation History:".bold());
        for (i, item) in history.iter().enumerate() {
            println!("{}. User: {}", i + 1, item.user);
            println!("   Agent: {}", item.agent);
        }
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}

/// Advice for engine failures that may clear up on their own
fn error_hint(err: &eyre::Report) -> Option<&'static str> {
    match err.downcast_ref::<OrchestratorError>() {
        Some(OrchestratorError::Llm(e)) if e.is_rate_limit() => {
            Some("The engine is rate limiting requests. Wait a moment and try again.")
        }
        Some(OrchestratorError::Llm(e)) if e.is_retryable() => Some("The engine failed transiently. Try again."),
        _ => None,
    }
}
