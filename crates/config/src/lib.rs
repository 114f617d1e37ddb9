//! Configuration loading, validation, and management for Gradwise.
//!
//! Loads configuration from `~/.gradwise/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.gradwise/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Completion provider; "none" runs fully offline on the deterministic paths
    #[serde(default = "default_provider")]
    pub default_provider: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub records: RecordsConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub agent: AgentSettings,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("memory", &self.memory)
            .field("records", &self.records)
            .field("context", &self.context)
            .field("agent", &self.agent)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// `[memory]`: where records live and how they are embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "file", "in_memory" or "none"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// JSON-lines file for the "file" backend; defaults to
    /// `~/.gradwise/memory.jsonl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Provider used for embeddings, or "none" for lexical-only retrieval
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_memory_backend() -> String {
    "file".into()
}
fn default_embedding_provider() -> String {
    "none".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
        }
    }
}

impl MemoryConfig {
    /// The journal path, falling back to the default location.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("memory.jsonl"))
    }
}

/// `[records]`: the applications and tasks the tools operate on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Keep records in a JSON snapshot between runs
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Snapshot file; defaults to `~/.gradwise/records.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            persist: true,
            path: None,
        }
    }
}

impl RecordsConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("records.json"))
    }
}

/// `[context]`: how much history goes into each prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Estimated-token budget for the assembled context
    #[serde(default = "default_budget")]
    pub budget: usize,

    #[serde(default = "default_tokens_per_word")]
    pub tokens_per_word: f64,

    #[serde(default = "default_recent_messages")]
    pub recent_messages: usize,

    #[serde(default = "default_message_chars")]
    pub message_chars: usize,

    #[serde(default = "default_conversation_records")]
    pub conversation_records: usize,

    #[serde(default = "default_conversation_chars")]
    pub conversation_chars: usize,

    #[serde(default = "default_preference_records")]
    pub preference_records: usize,

    #[serde(default = "default_preference_chars")]
    pub preference_chars: usize,
}

fn default_budget() -> usize {
    2000
}
fn default_tokens_per_word() -> f64 {
    1.3
}
fn default_recent_messages() -> usize {
    6
}
fn default_message_chars() -> usize {
    300
}
fn default_conversation_records() -> usize {
    3
}
fn default_conversation_chars() -> usize {
    400
}
fn default_preference_records() -> usize {
    2
}
fn default_preference_chars() -> usize {
    200
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            tokens_per_word: default_tokens_per_word(),
            recent_messages: default_recent_messages(),
            message_chars: default_message_chars(),
            conversation_records: default_conversation_records(),
            conversation_chars: default_conversation_chars(),
            preference_records: default_preference_records(),
            preference_chars: default_preference_chars(),
        }
    }
}

/// `[agent]`: sampling, limits and timeouts for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_decision_temperature")]
    pub decision_temperature: f32,

    #[serde(default = "default_decision_max_tokens")]
    pub decision_max_tokens: u32,

    #[serde(default = "default_response_temperature")]
    pub response_temperature: f32,

    #[serde(default = "default_response_max_tokens")]
    pub response_max_tokens: u32,

    #[serde(default = "default_backend_timeout_secs")]
    pub backend_timeout_secs: u64,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,

    #[serde(default = "default_state_timeout_secs")]
    pub state_timeout_secs: u64,

    /// Cap on the tool result shown to the response prompt
    #[serde(default = "default_tool_result_chars")]
    pub tool_result_chars: usize,

    /// Cap on the state summary shown to the response prompt
    #[serde(default = "default_state_summary_chars")]
    pub state_summary_chars: usize,

    /// Message units kept in each session window
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    /// Horizon for "upcoming deadlines" in the state summary
    #[serde(default = "default_deadline_days")]
    pub deadline_days: u32,
}

fn default_decision_temperature() -> f32 {
    0.1
}
fn default_decision_max_tokens() -> u32 {
    500
}
fn default_response_temperature() -> f32 {
    0.7
}
fn default_response_max_tokens() -> u32 {
    1000
}
fn default_backend_timeout_secs() -> u64 {
    30
}
fn default_tool_timeout_secs() -> u64 {
    15
}
fn default_embed_timeout_secs() -> u64 {
    10
}
fn default_state_timeout_secs() -> u64 {
    5
}
fn default_tool_result_chars() -> usize {
    1000
}
fn default_state_summary_chars() -> usize {
    2000
}
fn default_window_capacity() -> usize {
    20
}
fn default_deadline_days() -> u32 {
    14
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            decision_temperature: default_decision_temperature(),
            decision_max_tokens: default_decision_max_tokens(),
            response_temperature: default_response_temperature(),
            response_max_tokens: default_response_max_tokens(),
            backend_timeout_secs: default_backend_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            embed_timeout_secs: default_embed_timeout_secs(),
            state_timeout_secs: default_state_timeout_secs(),
            tool_result_chars: default_tool_result_chars(),
            state_summary_chars: default_state_summary_chars(),
            window_capacity: default_window_capacity(),
            deadline_days: default_deadline_days(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.gradwise/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `GRADWISE_API_KEY` (highest priority)
    /// - `OPENAI_API_KEY`
    /// - `OPENROUTER_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("GRADWISE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("GRADWISE_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("GRADWISE_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".gradwise")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, t) in [
            ("agent.decision_temperature", self.agent.decision_temperature),
            ("agent.response_temperature", self.agent.response_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.context.budget == 0 {
            return Err(ConfigError::ValidationError("context.budget must be > 0".into()));
        }

        if self.context.tokens_per_word <= 0.0 {
            return Err(ConfigError::ValidationError(
                "context.tokens_per_word must be > 0".into(),
            ));
        }

        if self.agent.window_capacity < self.context.recent_messages {
            return Err(ConfigError::ValidationError(
                "agent.window_capacity must be >= context.recent_messages".into(),
            ));
        }

        match self.memory.backend.as_str() {
            "file" | "in_memory" | "none" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown memory.backend '{other}' (expected file, in_memory or none)"
                )));
            }
        }

        if [
            self.agent.backend_timeout_secs,
            self.agent.tool_timeout_secs,
            self.agent.embed_timeout_secs,
            self.agent.state_timeout_secs,
        ]
        .contains(&0)
        {
            return Err(ConfigError::ValidationError("timeouts must be > 0".into()));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            memory: MemoryConfig::default(),
            records: RecordsConfig::default(),
            context: ContextConfig::default(),
            agent: AgentSettings::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
