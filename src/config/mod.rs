#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Environment variable that overrides the provider API key from the config
/// file, so the secret never has to live on disk.
pub const API_KEY_ENV: &str = "SCRIPT_SEARCH_API_KEY";

const MIN_EMBEDDING_DIMENSION: u32 = 64;
const MAX_EMBEDDING_DIMENSION: u32 = 4096;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub seeding: SeedingConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Requested vector length. When unset the provider's model default is
    /// used and whatever length comes back is accepted.
    pub dimensions: Option<u32>,
    pub batch_size: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: None,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeedingConfig {
    /// Default directory walked by `seed` when no --directory is given.
    pub scripts_dir: PathBuf,
    /// File extensions treated as scripts during discovery.
    pub extensions: Vec<String>,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("scripts"),
            extensions: vec![
                "sh".to_string(),
                "bash".to_string(),
                "ts".to_string(),
                "py".to_string(),
            ],
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Provider API key is not set (set {API_KEY_ENV} or provider.api_key)")]
    MissingApiKey,
    #[error("Invalid provider base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error(
        "Invalid embedding dimension: {0} (must be between {MIN_EMBEDDING_DIMENSION} and {MAX_EMBEDDING_DIMENSION})"
    )]
    InvalidEmbeddingDimension(u32),
    #[error("No script extensions configured for seeding")]
    NoExtensions,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from `config.toml` under the given directory,
    /// applying the API key environment override and validating eagerly.
    /// A missing required value fails here, not on first use.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

            let mut config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
            config.base_dir = config_dir.as_ref().to_path_buf();
            config
        } else {
            Self {
                provider: ProviderConfig::default(),
                seeding: SeedingConfig::default(),
                base_dir: config_dir.as_ref().to_path_buf(),
            }
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.provider.api_key = key;
            }
        }

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    /// Load from the conventional per-user config directory.
    #[inline]
    pub fn load_default() -> Result<Self> {
        Self::load(get_config_dir()?)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate()?;

        if self.seeding.extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }

        Ok(())
    }

    /// Path of the SQLite store. The store URL is a file path here; the
    /// embedded store carries no separate auth credential.
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("scripts.db")
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        self.endpoint()?;

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if let Some(dimensions) = self.dimensions {
            if !(MIN_EMBEDDING_DIMENSION..=MAX_EMBEDDING_DIMENSION).contains(&dimensions) {
                return Err(ConfigError::InvalidEmbeddingDimension(dimensions));
            }
        }

        Ok(())
    }

    /// Full URL of the provider's embeddings endpoint.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidBaseUrl(self.base_url.clone()))
    }
}

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("script-search"))
        .ok_or(ConfigError::DirectoryError)
}
