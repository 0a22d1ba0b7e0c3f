//! Malaz configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable that overrides `llm.model`
pub const MODEL_ENV: &str = "MALAZ_MODEL";

/// Main Malaz configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level used when `--log-level` is not given
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Reasoning-engine provider configuration
    pub llm: LlmConfig,

    /// Tool execution limits
    pub tools: ToolsConfig,

    /// Conversation memory settings
    pub memory: MemoryConfig,

    /// Project summarization settings
    pub project: ProjectConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        debug!(api_key_env = %self.llm.api_key_env, "Config::validate: called");
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .malaz.yml
        let local_config = PathBuf::from(".malaz.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/malaz/malaz.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("malaz").join("malaz.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply `MALAZ_MODEL` if set and non-empty
    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var(MODEL_ENV)
            && !model.trim().is_empty()
        {
            debug!(%model, "Config::apply_env_overrides: model overridden from environment");
            self.llm.model = model;
        }
    }
}

/// Reasoning-engine provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "openai" or "anthropic"
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Response cap of the first call of a turn
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 2000,
            timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        debug!(api_key_env = %self.api_key_env, "LlmConfig::get_api_key: called");
        std::env::var(&self.api_key_env).context(format!("{} environment variable not set", self.api_key_env))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Tool execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Hard timeout for shell commands in milliseconds
    #[serde(rename = "command-timeout-ms")]
    pub command_timeout_ms: u64,

    /// Run `run_shell` commands through the deny-list as well
    #[serde(rename = "sanitize-shell")]
    pub sanitize_shell: bool,

    /// Maximum characters of rendered command output
    #[serde(rename = "max-output-chars")]
    pub max_output_chars: usize,

    /// Maximum matches returned by `search_code`
    #[serde(rename = "search-max-results")]
    pub search_max_results: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 30_000,
            sanitize_shell: false,
            max_output_chars: 30_000,
            search_max_results: 200,
        }
    }
}

impl ToolsConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Conversation memory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// History file, relative to the project root
    pub file: String,

    /// Maximum retained interactions
    #[serde(rename = "max-history")]
    pub max_history: usize,

    /// Word budget of the rendered context
    #[serde(rename = "context-word-budget")]
    pub context_word_budget: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            file: "malaz_memory.json".to_string(),
            max_history: 20,
            context_word_budget: 2000,
        }
    }
}

/// Project summarization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Maximum entries per list in the project context
    #[serde(rename = "max-context-files")]
    pub max_context_files: usize,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { max_context_files: 20 }
    }
}
