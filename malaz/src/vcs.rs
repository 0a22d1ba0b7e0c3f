//! Git commit integration

use std::path::Path;
use tracing::{debug, info};

use crate::tools::{CommandExecutor, CommandSanitizer, ToolError};

/// Message used when the caller gives none
pub const DEFAULT_COMMIT_MESSAGE: &str = "Auto-commit by Malaz";

/// Result text when the project is not a repository
pub const NO_VCS: &str = "No version control system detected";

/// Quote `message` for a single-quoted shell argument
fn shell_quote(message: &str) -> String {
    format!("'{}'", message.replace('\'', r"'\''"))
}

/// Stages everything and commits it in one linear step
pub struct VcsIntegration<'a> {
    root: &'a Path,
    sanitizer: &'a CommandSanitizer,
    executor: &'a CommandExecutor,
}

impl<'a> VcsIntegration<'a> {
    pub fn new(root: &'a Path, sanitizer: &'a CommandSanitizer, executor: &'a CommandExecutor) -> Self {
        Self {
            root,
            sanitizer,
            executor,
        }
    }

    pub fn detect(&self) -> bool {
        self.root.join(".git").exists()
    }

    /// Run `git add .` then `git commit`, returning the transcript
    ///
    /// Stops at the first step with a non-zero exit and appends its stderr.
    pub async fn commit_changes(&self, message: &str) -> Result<String, ToolError> {
        debug!(%message, root = ?self.root, "VcsIntegration::commit_changes: called");
        if !self.detect() {
            debug!("VcsIntegration::commit_changes: no repository");
            return Ok(NO_VCS.to_string());
        }

        let commands = ["git add .".to_string(), format!("git commit -m {}", shell_quote(message))];
        // every step passes the deny-list before any of them runs
        let sanitized = commands
            .iter()
            .map(|command| self.sanitizer.sanitize(command))
            .collect::<Result<Vec<_>, _>>()?;
        let mut transcript = String::new();

        for (command, sanitized) in commands.iter().zip(&sanitized) {
            let result = self.executor.execute(sanitized, self.root).await?;
            transcript.push_str(&format!("$ {}\n{}\n", command, result.stdout));
            if !result.success() {
                debug!(%command, exit_code = %result.exit_code, "VcsIntegration::commit_changes: step failed");
                transcript.push_str(&format!("Error: {}", result.stderr));
                return Ok(transcript);
            }
        }

        info!("VcsIntegration::commit_changes: changes committed");
        Ok(transcript)
    }
}
