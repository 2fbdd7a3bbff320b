//! Configuration loading, validation, and management for RagBridge.
//!
//! Loads configuration from `~/.ragbridge/config.toml` (or an explicit
//! path) with environment variable overrides. Validates all settings at
//! startup; the result is read-only for the life of the process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Placeholder replaced by the retrieved context in the contextual template.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// The root configuration structure.
///
/// Maps directly to `config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider used when a request names none
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used when neither the request nor the provider names one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// What to do when a request names a model outside a provider's allow-list
    #[serde(default)]
    pub model_fallback: ModelFallback,

    /// Deadline for one chat request, retrieval and generation included
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub assembler: AssemblerConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub sessions: SessionConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Provider-specific configurations, keyed by the identifier callers use
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    150
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
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
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("model_fallback", &self.model_fallback)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("assembler", &self.assembler)
            .field("retrieval", &self.retrieval)
            .field("storage", &self.storage)
            .field("gateway", &self.gateway)
            .field("sessions", &self.sessions)
            .field("retry", &self.retry)
            .field("providers", &self.providers)
            .finish()
    }
}

/// Policy for a requested model that a provider does not allow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFallback {
    /// Reject the request as unsupported.
    #[default]
    Reject,
    /// Log a warning and use the provider's default model.
    Default,
}

/// Prompt assembly budgets and instruction text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Turns kept per session; counted in user/assistant pairs, so must be even
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Persona and domain framing, always first in the system message
    #[serde(default = "default_base_instructions")]
    pub base_instructions: String,

    /// Appended when no context was retrieved
    #[serde(default = "default_fallback_instructions")]
    pub fallback_instructions: String,

    /// Appended when context was retrieved; `{context}` is replaced by it
    #[serde(default = "default_contextual_instructions_template")]
    pub contextual_instructions_template: String,
}

fn default_max_context_chars() -> usize {
    2000
}
fn default_max_history_turns() -> usize {
    6
}
fn default_base_instructions() -> String {
    "You are a helpful assistant for this site's users. Answer clearly and concisely, \
     in the language the user writes in."
        .into()
}
fn default_fallback_instructions() -> String {
    "No reference documents matched this question. Answer from your general knowledge, \
     and say so plainly when you are not sure."
        .into()
}
fn default_contextual_instructions_template() -> String {
    "[Retrieved Information]\n{context}\n[End of Retrieved Information]\n\n\
     Prefer the retrieved information above when answering. If it is not enough to answer, \
     ask the user a clarifying question instead of guessing."
        .into()
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_context_chars: default_max_context_chars(),
            max_history_turns: default_max_history_turns(),
            base_instructions: default_base_instructions(),
            fallback_instructions: default_fallback_instructions(),
            contextual_instructions_template: default_contextual_instructions_template(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Fragments scored below this are discarded before assembly
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,

    /// Chunk size, in characters, for uploaded documents
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,

    /// Provider used for embeddings; keyword search only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_top_k() -> usize {
    3
}
fn default_min_relevance() -> f32 {
    0.3
}
fn default_chunk_chars() -> usize {
    2000
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: default_top_k(),
            min_relevance: default_min_relevance(),
            chunk_chars: default_chunk_chars(),
            embedding_provider: None,
            embedding_model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Extra CORS origins; same-origin only when empty
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions kept in memory before the least recently used is dropped
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_sessions() -> usize {
    1_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per generation call, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff; doubled after every failed attempt
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    250
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Which wire protocol a provider speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `/chat/completions` with a message array
    #[default]
    OpenaiChat,
    /// Legacy `/completions` with a single prompt string
    OpenaiCompletions,
    /// Anthropic Messages API
    Anthropic,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Models callers may request; any model when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("models", &self.models)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragbridge/config.toml),
    /// then apply environment overrides:
    /// - `RAGBRIDGE_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `RAGBRIDGE_PROVIDER`, `RAGBRIDGE_MODEL`
    /// - `PORT`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path` and apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
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

    /// Apply overrides from an environment lookup and re-validate.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("RAGBRIDGE_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("RAGBRIDGE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("RAGBRIDGE_MODEL") {
            self.default_model = model;
        }

        if let Some(port) = lookup("PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("PORT must be a port number, got '{port}'"))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragbridge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.assembler.max_history_turns % 2 != 0 {
            return Err(ConfigError::ValidationError(
                "assembler.max_history_turns must be even (history is kept in user/assistant pairs)"
                    .into(),
            ));
        }

        if !self
            .assembler
            .contextual_instructions_template
            .contains(CONTEXT_PLACEHOLDER)
        {
            return Err(ConfigError::ValidationError(format!(
                "assembler.contextual_instructions_template must contain {CONTEXT_PLACEHOLDER}"
            )));
        }

        if !(0.0..=1.0).contains(&self.retrieval.min_relevance) {
            return Err(ConfigError::ValidationError(
                "retrieval.min_relevance must be between 0.0 and 1.0".into(),
            ));
        }

        if self.retrieval.chunk_chars == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_chars must be > 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        if self.sessions.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.max_sessions must be > 0".into(),
            ));
        }

        if let Some(embedder) = &self.retrieval.embedding_provider {
            if !self.providers.is_empty() && !self.providers.contains_key(embedder) {
                return Err(ConfigError::ValidationError(format!(
                    "retrieval.embedding_provider '{embedder}' is not a configured provider"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string.
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
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            model_fallback: ModelFallback::default(),
            request_timeout_secs: default_request_timeout_secs(),
            assembler: AssemblerConfig::default(),
            retrieval: RetrievalConfig::default(),
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
            sessions: SessionConfig::default(),
            retry: RetryConfig::default(),
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
