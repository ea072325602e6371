//! Server configuration loading from file and environment variables.

use dialtone_media::MediaConfig;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Call-flow settings.
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Conversational AI backend.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Media pipeline.
    #[serde(default)]
    pub media: MediaConfig,

    /// Diagnostics log view.
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Call-flow configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelephonyConfig {
    /// Caller identifiers (phone numbers) allowed to use the service.
    /// An empty list rejects every call.
    #[serde(default)]
    pub allowed_callers: Vec<String>,

    /// Voice used for spoken prompts.
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Language for speech synthesis and recognition.
    #[serde(default = "default_language")]
    pub language: String,

    /// Pause between polls while a media job is pending.
    #[serde(default = "default_poll_pause_seconds")]
    pub poll_pause_seconds: u32,

    /// Cumulative time a call keeps polling a media job before giving up.
    #[serde(default = "default_wait_budget_seconds")]
    pub wait_budget_seconds: u64,

    /// Sessions without events for this long are dropped.
    #[serde(default = "default_session_idle_seconds")]
    pub session_idle_seconds: u64,
}

/// Conversational AI backend (OpenAI-compatible chat completions).
#[derive(Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Credentials, tried in order until one succeeds.
    #[serde(default)]
    pub api_keys: Vec<String>,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Per-request timeout for one credential.
    #[serde(default = "default_assistant_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Cap on one reply across every credential. Must stay below the
    /// telephony provider's webhook timeout.
    #[serde(default = "default_assistant_deadline_seconds")]
    pub deadline_seconds: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Password-gated log view.
#[derive(Clone, Deserialize)]
pub struct DiagnosticsConfig {
    /// Access password. The view is disabled when unset.
    #[serde(default)]
    pub password: Option<String>,

    /// Auto-refresh interval sent to the browser.
    #[serde(default = "default_refresh_seconds")]
    pub refresh_seconds: u32,

    /// Number of log lines kept in memory.
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "dialtone_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_voice() -> String {
    "Polly.Joanna".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_poll_pause_seconds() -> u32 {
    3
}

fn default_wait_budget_seconds() -> u64 {
    60
}

fn default_session_idle_seconds() -> u64 {
    2 * 60 * 60
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_system_prompt() -> String {
    "You are a friendly assistant answering a phone call. Replies are read aloud, \
     so keep them short, plain and free of markup."
        .to_string()
}

fn default_assistant_timeout_seconds() -> u64 {
    6
}

fn default_assistant_deadline_seconds() -> u64 {
    10
}

fn default_max_tokens() -> u32 {
    300
}

fn default_refresh_seconds() -> u32 {
    5
}

fn default_log_capacity() -> usize {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            allowed_callers: Vec::new(),
            voice: default_voice(),
            language: default_language(),
            poll_pause_seconds: default_poll_pause_seconds(),
            wait_budget_seconds: default_wait_budget_seconds(),
            session_idle_seconds: default_session_idle_seconds(),
        }
    }
}

impl TelephonyConfig {
    pub fn wait_budget(&self) -> Duration {
        Duration::from_secs(self.wait_budget_seconds)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_seconds)
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            api_keys: Vec::new(),
            system_prompt: default_system_prompt(),
            timeout_seconds: default_assistant_timeout_seconds(),
            deadline_seconds: default_assistant_deadline_seconds(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_keys", &format!("[{} REDACTED]", self.api_keys.len()))
            .field("timeout_seconds", &self.timeout_seconds)
            .field("deadline_seconds", &self.deadline_seconds)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            password: None,
            refresh_seconds: default_refresh_seconds(),
            capacity: default_log_capacity(),
        }
    }
}

impl fmt::Debug for DiagnosticsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsConfig")
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_seconds", &self.refresh_seconds)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Splits a comma-separated environment value, dropping empty entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `DIALTONE_HOST` overrides `server.host`
/// - `DIALTONE_PORT` overrides `server.port`
/// - `DIALTONE_PUBLIC_URL` overrides `media.public_base_url`
/// - `DIALTONE_STORAGE_DIR` overrides `media.storage_dir`
/// - `DIALTONE_ALLOWED_CALLERS` overrides `telephony.allowed_callers` (comma-separated)
/// - `DIALTONE_AI_KEYS` overrides `assistant.api_keys` (comma-separated, tried in order)
/// - `DIALTONE_AI_BASE` overrides `assistant.api_base`
/// - `DIALTONE_AI_MODEL` overrides `assistant.model`
/// - `DIALTONE_DIAGNOSTICS_PASSWORD` overrides `diagnostics.password`
/// - `DIALTONE_LOG_LEVEL` overrides `logging.level`
/// - `DIALTONE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

/// Applies environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(host) = lookup("DIALTONE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("DIALTONE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(url) = lookup("DIALTONE_PUBLIC_URL") {
        config.media.public_base_url = url;
    }
    if let Some(dir) = lookup("DIALTONE_STORAGE_DIR") {
        config.media.storage_dir = PathBuf::from(dir);
    }
    if let Some(callers) = lookup("DIALTONE_ALLOWED_CALLERS") {
        config.telephony.allowed_callers = split_list(&callers);
    }
    if let Some(keys) = lookup("DIALTONE_AI_KEYS") {
        config.assistant.api_keys = split_list(&keys);
    }
    if let Some(base) = lookup("DIALTONE_AI_BASE") {
        config.assistant.api_base = base;
    }
    if let Some(model) = lookup("DIALTONE_AI_MODEL") {
        config.assistant.model = model;
    }
    if let Some(password) = lookup("DIALTONE_DIAGNOSTICS_PASSWORD") {
        config.diagnostics.password = Some(password).filter(|p| !p.is_empty());
    }
    if let Some(level) = lookup("DIALTONE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("DIALTONE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    config
}
