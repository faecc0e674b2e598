use crate::derived::{self, Formula};
use crate::section::SectionMarkers;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from memsim-stats.toml.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub channels: ChannelsConfig,
    pub memory_system: MemorySystemConfig,
    pub stash: StashConfig,
    /// Derived metric formulas applied to each memory-system file.
    pub derived: Vec<Formula>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub label_prefix: String,
    pub color: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MemorySystemConfig {
    pub section_header: String,
    pub entity_marker: String,
    pub partition_counter: String,
    pub with_prefix: String,
    pub without_prefix: String,
    pub index_file: PathBuf,
    pub on_missing_metric: MissingMetricPolicy,
    pub file_pattern: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StashConfig {
    pub artifact_prefix: String,
}

/// What to do when a derived metric's base metric is absent from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MissingMetricPolicy {
    /// Stop the whole batch with an error.
    Abort,
    /// Warn and leave the file out of the dataset.
    Skip,
}

// --- Default implementations ---

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            channels: ChannelsConfig::default(),
            memory_system: MemorySystemConfig::default(),
            stash: StashConfig::default(),
            derived: derived::default_formulas(),
        }
    }
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            label_prefix: "Channel".to_string(),
            color: "teal".to_string(),
        }
    }
}

impl Default for MemorySystemConfig {
    fn default() -> Self {
        Self {
            section_header: "MemorySystem:".to_string(),
            entity_marker: "Controller:".to_string(),
            partition_counter: "integrity_controller_active_cycles".to_string(),
            with_prefix: "with_hash_".to_string(),
            without_prefix: "no_hash_".to_string(),
            index_file: PathBuf::from("index_configurations.txt"),
            on_missing_metric: MissingMetricPolicy::Abort,
            file_pattern: "*".to_string(),
        }
    }
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            artifact_prefix: "grafico_".to_string(),
        }
    }
}

impl MemorySystemConfig {
    pub fn markers(&self) -> SectionMarkers {
        SectionMarkers {
            header: self.section_header.clone(),
            entity: self.entity_marker.clone(),
        }
    }
}

/// Load configuration from `path`. A missing file yields defaults; a file
/// that exists but cannot be read or parsed is an error.
pub fn load(path: &Path) -> Result<StatsConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(StatsConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let config: StatsConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Err(e) = glob::Pattern::new(&config.memory_system.file_pattern) {
        return Err(ConfigError::Pattern {
            pattern: config.memory_system.file_pattern.clone(),
            source: e,
        });
    }

    Ok(config)
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
            ConfigError::Pattern { pattern, source } => {
                write!(f, "invalid file_pattern '{pattern}': {source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Pattern { source, .. } => Some(source),
        }
    }
}
