use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::embedding::{DEFAULT_CACHE_SIZE, EMBEDDING_DIMENSION};
use crate::error::{EngramError, Result};
use crate::memory::trigger::ArchivalTrigger;
use crate::memory::types::DEFAULT_TOKEN_LIMIT;

/// Main configuration structure for Engram
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Archival pipeline configuration
    #[serde(default)]
    pub archival: ArchivalConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// With an explicit path, the file must exist and parse. Without one,
    /// the standard locations are probed in order and missing files fall
    /// back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            info!("Loading config from: {}", path.display());
            let content = std::fs::read_to_string(path).map_err(|e| {
                EngramError::Config(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            return Self::from_toml(&content);
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".engram").join("config.toml")),
            dirs::config_dir().map(|c| c.join("engram").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        for candidate in default_paths.iter().flatten() {
            if candidate.exists() {
                info!("Loading config from: {}", candidate.display());
                let content = std::fs::read_to_string(candidate).map_err(|e| {
                    EngramError::Config(format!(
                        "Failed to read config file {}: {}",
                        candidate.display(),
                        e
                    ))
                })?;
                return Self::from_toml(&content);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| EngramError::Config(format!("Failed to parse config: {e}")))
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for the vector database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".engram"))
        .unwrap_or_else(|| PathBuf::from(".engram"))
}

/// Embedding model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding dimension size
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    /// Batch size for embedding generation
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
    /// Capacity of the embedding LRU cache
    #[serde(default = "default_embedding_cache_size")]
    pub cache_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            cache_size: default_embedding_cache_size(),
        }
    }
}

fn default_embedding_dimension() -> usize {
    EMBEDDING_DIMENSION
}

fn default_embedding_batch_size() -> usize {
    32
}

fn default_embedding_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

/// Archival pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchivalConfig {
    /// Age in hours after which an entry becomes an archival candidate
    #[serde(default = "default_age_threshold_hours")]
    pub age_threshold_hours: f32,
    /// Token pressure above which low-importance entries are shed
    #[serde(default = "default_token_pressure_threshold")]
    pub token_pressure_threshold: f32,
    /// Importance below which an entry may be shed under pressure
    #[serde(default = "default_min_importance_score")]
    pub min_importance_score: f32,
    /// Fraction of sentences kept when compressing content
    #[serde(default = "default_target_ratio")]
    pub target_ratio: f32,
    /// Seconds between scheduled archival passes
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Context window size used to normalize token pressure
    #[serde(default = "default_token_limit")]
    pub token_limit: u32,
}

impl ArchivalConfig {
    /// Interval between scheduled archival passes.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self {
            age_threshold_hours: default_age_threshold_hours(),
            token_pressure_threshold: default_token_pressure_threshold(),
            min_importance_score: default_min_importance_score(),
            target_ratio: default_target_ratio(),
            interval_seconds: default_interval_seconds(),
            token_limit: default_token_limit(),
        }
    }
}

impl From<&ArchivalConfig> for ArchivalTrigger {
    fn from(config: &ArchivalConfig) -> Self {
        Self {
            age_threshold_hours: config.age_threshold_hours,
            token_pressure_threshold: config.token_pressure_threshold,
            min_importance_score: config.min_importance_score,
            explicit_user_request: false,
        }
    }
}

fn default_age_threshold_hours() -> f32 {
    24.0
}

fn default_token_pressure_threshold() -> f32 {
    0.7
}

fn default_min_importance_score() -> f32 {
    0.3
}

fn default_target_ratio() -> f32 {
    0.3
}

fn default_interval_seconds() -> u64 {
    300
}

fn default_token_limit() -> u32 {
    DEFAULT_TOKEN_LIMIT
}
