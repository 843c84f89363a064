//! Configuration system for the sqlchat server
//!
//! Loads configuration from:
//! 1. config.yaml - operational settings (port, model, charts, logging)
//! 2. .env file - secrets (API keys, database password)
//!
//! Environment variables always override config.yaml values.

use serde::{Deserialize, Serialize};
use sqlchat_core::ConnectionParams;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// OpenAI-compatible chat-completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-70b-versatile".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

/// Default connection used when a `connect` call omits fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub user: String,
    pub host: String,
    pub port: u16,
    pub database: String,

    /// Refuse generated statements that are not read-only
    pub read_only: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let params = ConnectionParams::default();
        Self {
            user: params.user,
            host: params.host,
            port: params.port,
            database: params.database,
            read_only: true,
        }
    }
}

impl DatabaseConfig {
    /// Connection defaults, with the password taken from `DB_PASSWORD`
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            user: self.user.clone(),
            password: std::env::var("DB_PASSWORD").unwrap_or_default(),
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    /// Charts are written to `<directory>/<session_id>/<uuid>.png`
    pub directory: PathBuf,
    pub max_retries: usize,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./charts"),
            max_retries: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub charts: ChartsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(&path) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut config = Config::default();
                config.apply_env_overrides();
                Ok(config)
            }
            other => other,
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SQLCHAT_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SQLCHAT_SERVER_PORT") {
            if let Ok(port_num) = port.parse() {
                self.server.port = port_num;
            }
        }

        if let Ok(model) = std::env::var("SQLCHAT_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(base) = std::env::var("SQLCHAT_LLM_API_BASE") {
            self.llm.api_base = base;
        }
        if let Ok(dir) = std::env::var("SQLCHAT_CHARTS_DIR") {
            self.charts.directory = PathBuf::from(dir);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
    }

    /// API key from the environment: `LLM_API_KEY`, then `GROQ_API_KEY`, then `OPENAI_API_KEY`
    pub fn llm_api_key() -> Result<String, ConfigError> {
        ["LLM_API_KEY", "GROQ_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
            .ok_or_else(|| ConfigError::MissingEnvVar("LLM_API_KEY".to_string()))
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }
}
