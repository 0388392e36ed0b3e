//! Configuration loading, validation, and management for ctxkeeper.
//!
//! Loads configuration from `~/.ctxkeeper/config.toml` with environment
//! variable overrides. Validates all settings at startup.

pub mod models;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use models::{ModelInfo, ModelRegistry};

/// The root configuration structure.
///
/// Maps directly to `~/.ctxkeeper/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default chat model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default sampling temperature for chat turns
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Text-generation and embedding backend
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Persistence backend
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Context-budget and compaction settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Token counting settings
    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    /// Document chunking and search settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Known models, keyed by model identifier
    #[serde(default = "models::default_models")]
    pub models: BTreeMap<String, ModelInfo>,
}

fn default_model() -> String {
    "llama3.2:latest".into()
}
fn default_temperature() -> f32 {
    0.7
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("provider", &self.provider)
            .field("database", &self.database)
            .field("context", &self.context)
            .field("tokenizer", &self.tokenizer)
            .field("retrieval", &self.retrieval)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend label, used in logs and status output
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    /// OpenAI-compatible base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Every embedding vector must have exactly this many components
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_kind() -> String {
    "ollama".into()
}
fn default_api_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_embedding_model() -> String {
    "nomic-embed-text:v1.5".into()
}
fn default_embedding_dimension() -> usize {
    768
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            api_url: default_api_url(),
            api_key: None,
            embedding_model: default_embedding_model(),
            embedding_dimension: default_embedding_dimension(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimension", &self.embedding_dimension)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `sqlite`, `memory`, or `postgres`
    #[serde(default = "default_database_backend")]
    pub backend: String,

    /// Connection URL. Defaults to a file under the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_database_backend() -> String {
    "sqlite".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_database_backend(),
            url: None,
        }
    }
}

impl DatabaseConfig {
    /// The effective connection URL for the configured backend.
    pub fn resolved_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite://{}",
                AppConfig::config_dir().join("ctxkeeper.db").display()
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Compaction starts once history exceeds this share of the window
    #[serde(default = "default_trigger_fraction")]
    pub trigger_fraction: f64,

    /// Share of the trigger budget kept verbatim as the recent tail
    #[serde(default = "default_compression_ratio")]
    pub compression_ratio: f64,

    /// Messages always kept verbatim, regardless of their cost
    #[serde(default = "default_min_recent_messages")]
    pub min_recent_messages: usize,

    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,

    /// Window assumed for models missing from `[models]`
    #[serde(default = "default_context_window")]
    pub default_context_window: usize,
}

fn default_trigger_fraction() -> f64 {
    0.75
}
fn default_compression_ratio() -> f64 {
    0.3
}
fn default_min_recent_messages() -> usize {
    2
}
fn default_summary_temperature() -> f32 {
    0.3
}
fn default_context_window() -> usize {
    4096
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            trigger_fraction: default_trigger_fraction(),
            compression_ratio: default_compression_ratio(),
            min_recent_messages: default_min_recent_messages(),
            summary_temperature: default_summary_temperature(),
            default_context_window: default_context_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// `cl100k_base`, `p50k_base`, `r50k_base`, or `heuristic`
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Tokens charged per message for role and framing
    #[serde(default = "default_per_message_overhead")]
    pub per_message_overhead: usize,
}

fn default_encoding() -> String {
    "cl100k_base".into()
}
fn default_per_message_overhead() -> usize {
    4
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            per_message_overhead: default_per_message_overhead(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Target chunk size, in whitespace-delimited words
    #[serde(default = "default_chunk_size_words")]
    pub chunk_size_words: usize,

    /// Chunks returned per search
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_chunk_size_words() -> usize {
    1000
}
fn default_top_k() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size_words: default_chunk_size_words(),
            top_k: default_top_k(),
        }
    }
}

const ENCODINGS: &[&str] = &["cl100k_base", "p50k_base", "r50k_base", "heuristic"];
const BACKENDS: &[&str] = &["sqlite", "memory", "postgres"];

impl AppConfig {
    /// Load configuration from the default path (~/.ctxkeeper/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `CTXKEEPER_API_URL`
    /// - `CTXKEEPER_API_KEY`
    /// - `CTXKEEPER_MODEL`
    /// - `CTXKEEPER_DATABASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
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

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CTXKEEPER_API_URL") {
            self.provider.api_url = url;
        }
        if let Ok(key) = std::env::var("CTXKEEPER_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("CTXKEEPER_MODEL") {
            self.default_model = model;
        }
        if let Ok(url) = std::env::var("CTXKEEPER_DATABASE_URL") {
            self.database.url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ctxkeeper")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.context.summary_temperature) {
            return Err(ConfigError::ValidationError(
                "context.summary_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        for (name, value) in [
            ("context.trigger_fraction", self.context.trigger_fraction),
            ("context.compression_ratio", self.context.compression_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be in (0.0, 1.0], got {value}"
                )));
            }
        }

        if self.context.min_recent_messages == 0 {
            return Err(ConfigError::ValidationError(
                "context.min_recent_messages must be at least 1".into(),
            ));
        }

        if self.context.default_context_window == 0 {
            return Err(ConfigError::ValidationError(
                "context.default_context_window must be > 0".into(),
            ));
        }

        if let Some((name, _)) = self.models.iter().find(|(_, m)| m.context_window == 0) {
            return Err(ConfigError::ValidationError(format!(
                "models.\"{name}\".context_window must be > 0"
            )));
        }

        if self.retrieval.chunk_size_words == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_size_words must be > 0".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be > 0".into(),
            ));
        }

        if self.provider.embedding_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "provider.embedding_dimension must be > 0".into(),
            ));
        }

        if !ENCODINGS.contains(&self.tokenizer.encoding.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "tokenizer.encoding must be one of {ENCODINGS:?}, got '{}'",
                self.tokenizer.encoding
            )));
        }

        if !BACKENDS.contains(&self.database.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "database.backend must be one of {BACKENDS:?}, got '{}'",
                self.database.backend
            )));
        }

        Ok(())
    }

    /// Model metadata lookup with the configured fallback window.
    pub fn model_registry(&self) -> ModelRegistry {
        ModelRegistry::new(self.models.clone(), self.context.default_context_window)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_temperature: default_temperature(),
            provider: ProviderConfig::default(),
            database: DatabaseConfig::default(),
            context: ContextConfig::default(),
            tokenizer: TokenizerConfig::default(),
            retrieval: RetrievalConfig::default(),
            models: models::default_models(),
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
