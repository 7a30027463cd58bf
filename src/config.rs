//! Configuration module for Huddle.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{HuddleError, Result};

/// Environment variable holding the completion service credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the listening port.
pub const PORT_ENV: &str = "HUDDLE_PORT";

/// Chat listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Maximum length of a single client line in bytes, terminator included.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Number of pending outbound lines buffered per connection.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    /// Timeout in seconds for a single socket write.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
    /// Seconds a new connection has to send its display name.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_connections() -> usize {
    64
}

fn default_max_line_bytes() -> usize {
    64 * 1024
}

fn default_outbound_queue() -> usize {
    256
}

fn default_write_timeout() -> u64 {
    10
}

fn default_handshake_timeout() -> u64 {
    30
}

impl ServerConfig {
    /// Socket write timeout as a [`Duration`].
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Display-name handshake timeout as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            max_line_bytes: default_max_line_bytes(),
            outbound_queue: default_outbound_queue(),
            write_timeout_secs: default_write_timeout(),
            handshake_timeout_secs: default_handshake_timeout(),
        }
    }
}

/// Completion service configuration for the `#chat` command.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// API credential. Empty disables the service.
    #[serde(default)]
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling seed sent with every request.
    #[serde(default)]
    pub seed: i64,
    /// Total request timeout in seconds.
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    /// System directive placed at the head of the shared transcript.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_ai_timeout() -> u64 {
    30
}

fn default_system_prompt() -> String {
    "you are a gen z kid in a groupchat. use gen z slang and typeface. \
     DO NOT USE NEWLINES IN YOUR RESPONSE."
        .to_string()
}

impl AiConfig {
    /// Whether a credential is configured.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            seed: 0,
            timeout_secs: default_ai_timeout(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty logs to the console only.
    #[serde(default)]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Chat listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Completion service configuration.
    #[serde(default)]
    pub ai: AiConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(HuddleError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| HuddleError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `OPENAI_API_KEY`: completion service credential
    /// - `HUDDLE_PORT`: listening port
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored, as are ports that do not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = lookup(API_KEY_ENV) {
            if !api_key.trim().is_empty() {
                self.ai.api_key = api_key.trim().to_string();
            }
        }

        if let Some(port) = lookup(PORT_ENV) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid {}={:?}", PORT_ENV, port),
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(HuddleError::Validation(
                "server.max_connections must be at least 1".to_string(),
            ));
        }
        if self.server.max_line_bytes == 0 {
            return Err(HuddleError::Validation(
                "server.max_line_bytes must be at least 1".to_string(),
            ));
        }
        if self.server.outbound_queue == 0 {
            return Err(HuddleError::Validation(
                "server.outbound_queue must be at least 1".to_string(),
            ));
        }
        if self.server.write_timeout_secs == 0
            || self.server.handshake_timeout_secs == 0
            || self.ai.timeout_secs == 0
        {
            return Err(HuddleError::Validation(
                "timeouts must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}
