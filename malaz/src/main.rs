//! Malaz - sandboxed tool-calling coding agent
//!
//! CLI entry point: one request with REQUEST, otherwise the interactive REPL.

use std::fs;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use malaz::cli::{Cli, get_log_path};
use malaz::config::Config;
use malaz::llm::create_client;
use malaz::repl;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // API keys may live in ./.env
    dotenvy::dotenv().ok();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;
    debug!(?cli, "main: parsed arguments");

    config.validate()?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "Malaz loaded config");

    let client = create_client(&config.llm).context("Failed to create LLM client")?;
    let project_root = cli.project_root().context("Failed to determine project directory")?;

    repl::run(&config, client, &project_root, cli.request).await
}
