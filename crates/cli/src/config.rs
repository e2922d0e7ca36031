//! # Application Configuration
//!
//! Defines the configuration for the `ideasieve` binary and loads it in layers:
//! programmatic defaults, then an optional `config.yml` (with `${VAR}` substitution from
//! the environment), then plain environment variables for top-level keys such as
//! `DB_URL`, then `IDEASIEVE_`-prefixed variables for nested keys
//! (e.g. `IDEASIEVE_NOTION__DATABASE_ID`).

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::info;

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates an explicitly requested configuration file was not found.
    NotFound(String),
    /// A credential the chosen command needs is absent or empty.
    Missing(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
            ConfigError::Missing(key) => write!(f, "Missing required configuration value '{key}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// Returns the value when it is present and non-empty.
///
/// `${VAR}` substitution turns an unset variable into an empty string, so empty counts as
/// missing.
pub fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct AppConfig {
    /// Database holding the ledger, batch jobs and the vector index. Loaded from `DB_URL`.
    #[serde(default = "default_db_url")]
    pub db_url: String,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Caps how many new URLs a single run processes. Loaded from `MAX_URLS`.
    #[serde(default)]
    pub max_urls: Option<usize>,
    /// Characters of article text sent to the extraction model.
    #[serde(default = "default_max_page_chars")]
    pub max_page_chars: usize,
}

fn default_db_url() -> String {
    ideasieve::constants::DEFAULT_DB_FILE.to_string()
}

fn default_max_page_chars() -> usize {
    ideasieve_html::DEFAULT_MAX_CHARS
}

/// One RSS or Atom feed to poll.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[allow(dead_code)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Configuration for the embedding model provider.
#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub api_url: String,
    #[serde(default = "default_embedding_model")]
    pub model_name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_embedding_url() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_embedding_model() -> String {
    ideasieve::constants::EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> usize {
    ideasieve::constants::EMBEDDING_DIMENSION
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: default_embedding_url(),
            model_name: default_embedding_model(),
            api_key: None,
            dimension: default_dimension(),
        }
    }
}

/// The synchronous extraction model.
#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct ExtractionConfig {
    /// `"openai"` (any OpenAI-compatible endpoint) or `"gemini"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_chat_model")]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Replaces the built-in extraction instructions.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    ideasieve::constants::EXTRACTION_TEMPERATURE
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_url: None,
            api_key: None,
            model_name: default_chat_model(),
            temperature: default_temperature(),
            system_prompt: None,
        }
    }
}

/// The OpenAI Batch API used by `submit` and `collect`.
#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct BatchConfig {
    #[serde(default = "default_openai_base")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_chat_model")]
    pub model_name: String,
    #[serde(default = "default_completion_window")]
    pub completion_window: String,
}

fn default_openai_base() -> String {
    "https://api.openai.com".to_string()
}

fn default_completion_window() -> String {
    "24h".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_base(),
            api_key: None,
            model_name: default_chat_model(),
            completion_window: default_completion_window(),
        }
    }
}

impl BatchConfig {
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        required(&self.api_key, "batch.api_key")
    }
}

/// The Notion database that mirrors idea counts.
#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct NotionConfig {
    #[serde(default = "default_notion_base")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
    #[serde(default = "default_notion_version")]
    pub version: String,
}

fn default_notion_base() -> String {
    "https://api.notion.com".to_string()
}

fn default_notion_version() -> String {
    "2022-06-28".to_string()
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_notion_base(),
            api_key: None,
            database_id: None,
            version: default_notion_version(),
        }
    }
}

impl NotionConfig {
    /// Returns `(api_key, database_id)`.
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        Ok((
            required(&self.api_key, "notion.api_key")?,
            required(&self.database_id, "notion.database_id")?,
        ))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct DedupConfig {
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub match_policy: ideasieve::dedup::MatchPolicy,
}

fn default_threshold() -> f64 {
    ideasieve::constants::SIMILARITY_THRESHOLD
}

fn default_top_k() -> usize {
    ideasieve::constants::TOP_K
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_threshold(),
            top_k: default_top_k(),
            match_policy: Default::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct LedgerConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_retention_days() -> i64 {
    ideasieve::constants::LEDGER_RETENTION_DAYS
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

impl LedgerConfig {
    /// The purge window: `override_days` when given, else `retention_days`.
    pub fn retention(&self, override_days: Option<i64>) -> Result<chrono::Duration, ConfigError> {
        let days = override_days.unwrap_or(self.retention_days);
        if days < 0 {
            return Err(ConfigError::General(format!(
                "Retention must not be negative (got {days} days)"
            )));
        }
        chrono::Duration::try_days(days).ok_or_else(|| {
            ConfigError::General(format!("Retention of {days} days is out of range"))
        })
    }
}

// Helper to read a file, substitute env vars, and return its content.
// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(e.to_string()))?;
    let expanded_content = re.replace_all(&content, |caps: &regex::Captures| {
        let var_name = &caps["var"];
        env::var(var_name).unwrap_or_default()
    });

    Ok(Some(expanded_content.to_string()))
}

/// Loads the application configuration from a file and environment variables.
///
/// With an explicit path the file must exist. Without one, `./config.yml` is used when
/// present and the configuration otherwise comes from defaults and the environment.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    // Layer 1: Programmatic defaults.
    let mut builder = ConfigBuilder::builder().set_default("db_url", default_db_url())?;

    // Layer 2: The YAML file.
    match config_path_override {
        Some(path) => {
            let content = read_and_substitute(path)?.ok_or_else(|| {
                ConfigError::NotFound(format!("Config file not found at '{path}'."))
            })?;
            info!("Loading configuration from '{path}'.");
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None => {
            if let Some(content) = read_and_substitute("config.yml")? {
                info!("Loading configuration from 'config.yml'.");
                builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
            } else {
                info!("No config.yml found; using defaults and environment variables.");
            }
        }
    }

    let settings = builder
        // Layer 3: Top-level keys like DB_URL and MAX_URLS.
        .add_source(Environment::default().try_parsing(true))
        // Layer 4: Prefixed variables for nested overrides.
        .add_source(
            Environment::with_prefix("IDEASIEVE")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
