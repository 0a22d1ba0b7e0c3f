//! Command-line interface

use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

/// Malaz - sandboxed tool-calling coding agent
#[derive(Debug, Parser)]
#[command(
    name = "malaz",
    about = "Sandboxed tool-calling coding agent",
    version,
    after_help = "Without REQUEST an interactive session starts. Type /help inside it for commands."
)]
pub struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(short, long, value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Request to run once instead of starting the REPL
    #[arg(value_name = "REQUEST")]
    pub request: Option<String>,
}

impl Cli {
    /// Project root, falling back to the current directory
    pub fn project_root(&self) -> std::io::Result<PathBuf> {
        match &self.project {
            Some(path) => {
                debug!(?path, "Cli::project_root: using --project");
                Ok(path.clone())
            }
            None => {
                debug!("Cli::project_root: using current directory");
                std::env::current_dir()
            }
        }
    }
}

/// Path of the log file written by the binary
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("malaz")
        .join("logs")
        .join("malaz.log")
}
