//! CommandSanitizer - advisory deny-list for shell strings

use tracing::debug;

use super::SecurityError;

/// Substrings that reject a command, checked in this order
///
/// Matching is case-sensitive and purely textual. This is a guard against
/// accidents, not an isolation boundary.
pub const DENY_LIST: &[&str] = &[
    "rm ", "del ", "format ", "shutdown", "reboot", "chmod", "chown", "dd if=", "mv ", ">", "|",
];

/// Rejects command strings containing a deny-listed substring
#[derive(Debug, Clone)]
pub struct CommandSanitizer {
    deny_list: Vec<&'static str>,
}

impl Default for CommandSanitizer {
    fn default() -> Self {
        Self {
            deny_list: DENY_LIST.to_vec(),
        }
    }
}

impl CommandSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the command unchanged, or the first deny-list entry it contains
    pub fn sanitize(&self, command: &str) -> Result<String, SecurityError> {
        debug!(%command, "CommandSanitizer::sanitize: called");
        match self.deny_list.iter().find(|pattern| command.contains(**pattern)) {
            Some(pattern) => {
                debug!(%pattern, "CommandSanitizer::sanitize: forbidden pattern matched");
                Err(SecurityError::ForbiddenCommand {
                    matched: pattern.to_string(),
                })
            }
            None => {
                debug!("CommandSanitizer::sanitize: command allowed");
                Ok(command.to_string())
            }
        }
    }
}
