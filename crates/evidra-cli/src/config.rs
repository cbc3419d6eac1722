//! Application configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty file
//! (or no file at all) yields a working single-node setup. The OpenAI
//! API key can come from the file or the `OPENAI_API_KEY` environment
//! variable; the environment wins when both are set.

use evidra_agents::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "evidra.toml";

/// Configuration loading or validation failure
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io(String),
    /// The file was not valid TOML for this schema
    Parse(String),
    /// A value was out of range
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse config file: {e}"),
            ConfigError::Invalid(e) => write!(f, "invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// OpenAI model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    /// API key; falls back to the `OPENAI_API_KEY` environment variable
    pub api_key: Option<String>,
    /// Chat model used for extraction and contradiction checks
    pub chat_model: String,
    /// Embedding model
    pub embedding_model: String,
    /// Dimension of embedding vectors
    pub embedding_dimension: usize,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            chat_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
        }
    }
}

impl OpenAiSettings {
    /// Resolve the API key, preferring the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

/// One RSS feed to poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssFeedSettings {
    /// Name used in logs and as the journal fallback
    pub name: String,
    /// Feed URL
    pub url: String,
}

/// Literature source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Poll PubMed
    pub pubmed: bool,
    /// Override the default PubMed query
    pub pubmed_query: Option<String>,
    /// Poll CrossRef
    pub crossref: bool,
    /// Contact address for the CrossRef polite pool
    pub crossref_mailto: Option<String>,
    /// RSS feeds to poll
    pub rss_feeds: Vec<RssFeedSettings>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            pubmed: true,
            pubmed_query: None,
            crossref: true,
            crossref_mailto: None,
            rss_feeds: Vec::new(),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database path
    pub database_path: String,
    /// OpenAI settings
    pub openai: OpenAiSettings,
    /// Literature source settings
    pub sources: SourceSettings,
    /// Agent intervals, batch sizes, and thresholds
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "evidra.db".to_string(),
            openai: OpenAiSettings::default(),
            sources: SourceSettings::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, `evidra.toml` is used
    /// when present, otherwise defaults apply.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                if Path::new(DEFAULT_CONFIG_PATH).exists() {
                    Self::from_file(DEFAULT_CONFIG_PATH)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check the configuration for unusable values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid("database_path must not be empty".to_string()));
        }
        if self.openai.embedding_dimension == 0 {
            return Err(ConfigError::Invalid(
                "openai.embedding_dimension must be at least 1".to_string(),
            ));
        }
        for feed in &self.sources.rss_feeds {
            if feed.url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "rss feed '{}' has an empty url",
                    feed.name
                )));
            }
        }
        self.pipeline.validate().map_err(ConfigError::Invalid)
    }
}
