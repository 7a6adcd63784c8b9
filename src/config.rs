//! Configuration module for docqa.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.docqa/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DOCQA_` and use double
//! underscores to separate nested levels:
//! - `DOCQA_RETRIEVAL__TOP_K=5` sets `retrieval.top_k`
//! - `DOCQA_REMOTE__BASE_URL=http://localhost:8000/v1` sets `remote.base_url`
//! - `DOCQA_LOGGING__DEFAULT=debug` sets `logging.default`
//!
//! The API key is read from `remote.api_key`, then from `DOCQA_API_KEY`,
//! `OPENAI_API_KEY` and `SILICON_API_KEY`, in that order.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::documents::ChunkingConfig;

/// Name of the per-workspace directory holding settings, index and uploads.
pub const WORKSPACE_DIR: &str = ".docqa";

const SETTINGS_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "DOCQA_";
const API_KEY_ENV_VARS: [&str; 3] = ["DOCQA_API_KEY", "OPENAI_API_KEY", "SILICON_API_KEY"];

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding the vector index generations
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Where uploaded PDFs are persisted before ingest (overwritten each time)
    #[serde(default = "default_upload_path")]
    pub upload_path: PathBuf,

    /// Workspace root directory (where .docqa is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Shared endpoint, credential and retry settings for remote APIs
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Log levels: a default plus per-target overrides.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for all targets ("error", "warn", "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target levels, e.g. `remote = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RemoteConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer credential; environment fallbacks apply when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled on each further retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Cap for a single retry delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Maximum texts per embeddings request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Custom instruction template with `{context}` and `{question}` placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Hits scoring below this are dropped (the best hit is always kept)
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address for `docqa serve`
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Largest accepted upload in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".docqa/index")
}
fn default_upload_path() -> PathBuf {
    PathBuf::from(".docqa/data/uploaded.pdf")
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_base_url() -> String {
    "https://api.siliconflow.cn/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    8_000
}
fn default_embedding_model() -> String {
    "BAAI/bge-m3".to_string()
}
fn default_batch_size() -> usize {
    50
}
fn default_chat_model() -> String {
    "deepseek-ai/DeepSeek-V3".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_top_k() -> usize {
    3
}
fn default_min_score() -> f32 {
    0.45
}
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            upload_path: default_upload_path(),
            workspace_root: None,
            logging: LoggingConfig::default(),
            chunking: ChunkingConfig::default(),
            remote: RemoteConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: None,
            prompt_template: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl RemoteConfig {
    /// Configured key, else the first non-blank key from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| {
                API_KEY_ENV_VARS.iter().find_map(|var| {
                    std::env::var(var)
                        .ok()
                        .map(|key| key.trim().to_string())
                        .filter(|key| !key.is_empty())
                })
            })
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .docqa directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(WORKSPACE_DIR).join(SETTINGS_FILE));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    /// Defaults, then the TOML file, then `DOCQA_` environment variables.
    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore (__) separates nested levels,
            // single underscore (_) remains as is within field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
    }

    /// Find the workspace settings file by looking for a .docqa directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(WORKSPACE_DIR).join(SETTINGS_FILE))
    }

    /// Get the workspace root directory (where .docqa is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(WORKSPACE_DIR);
            if config_dir.is_dir() {
                return Some(ancestor.to_path_buf());
            }
        }

        None
    }

    /// Resolve a configured path against the workspace root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Absolute location of the index directory.
    pub fn index_dir(&self) -> PathBuf {
        self.resolve_path(&self.index_path)
    }

    /// Absolute location of the persisted upload.
    pub fn upload_file(&self) -> PathBuf {
        self.resolve_path(&self.upload_path)
    }

    /// Reject settings no session could run with.
    pub fn validate(&self) -> Result<(), String> {
        self.chunking
            .validate()
            .map_err(|e| format!("[chunking] {e}"))?;

        if self.retrieval.top_k == 0 {
            return Err("[retrieval] top_k must be at least 1".to_string());
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_score) {
            return Err(format!(
                "[retrieval] min_score must be between -1.0 and 1.0, got {}",
                self.retrieval.min_score
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err("[embedding] batch_size must be at least 1".to_string());
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(format!(
                "[generation] temperature must be between 0.0 and 2.0, got {}",
                self.generation.temperature
            ));
        }
        if self.remote.base_url.trim().is_empty() {
            return Err("[remote] base_url must not be empty".to_string());
        }
        if let Some(template) = &self.generation.prompt_template {
            crate::qa::PromptTemplate::new(template.clone())
                .map_err(|e| format!("[generation] {e}"))?;
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory's `.docqa/`
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(WORKSPACE_DIR).join(SETTINGS_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}
