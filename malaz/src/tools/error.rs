//! Tool error types

use std::path::PathBuf;
use thiserror::Error;

/// Boundary violations detected by the sandbox or the command deny-list
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Attempt to access path outside project: {path}")]
    PathEscape { path: String, root: PathBuf },

    #[error("Forbidden command detected: {matched}")]
    ForbiddenCommand { matched: String },
}

/// Errors that can occur during tool execution
///
/// Handlers return these typed; [`ToolError::render`] turns them into the text
/// the reasoning engine sees.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("Unknown tool {name}")]
    UnknownTool { name: String },

    #[error("File not found - {path}")]
    NotFound { path: String },

    #[error("Command timed out after {timeout_ms}ms: {command}")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(String),

    #[error("Path already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Template '{name}' not found")]
    UnknownTemplate { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolError {
    /// Render the error as engine-facing text
    pub fn render(&self) -> String {
        match self {
            ToolError::UnknownTool { name } => format!("Error: Unknown tool {}", name),
            ToolError::Security(e) => format!("Security Error: {}", e),
            other => format!("Tool Error: {}", other),
        }
    }

    pub fn is_security(&self) -> bool {
        matches!(self, ToolError::Security(_))
    }
}
