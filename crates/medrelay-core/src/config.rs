//! Configuration module for MedRelay.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation and defaults. The queue set declared here
//! is provisioned at startup and fixed for the process lifetime; there is no
//! dynamic queue creation afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::QueuePattern;

/// Top-level configuration for the MedRelay store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    pub blobs: BlobConfig,
    /// Queues provisioned at startup.
    pub queues: Vec<QueueDefinition>,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Payload blob store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    /// Root directory for content-addressed payload files.
    pub root: PathBuf,
}

/// One queue to provision at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueDefinition {
    /// Unique queue name, matched case-insensitively.
    pub name: String,
    /// Pattern flags as pipe-separated names: `inbound`, `outbound`,
    /// `dead_letter`, e.g. `"outbound|dead_letter"`.
    pub pattern: String,
}

impl QueueDefinition {
    /// Creates a definition from a name and parsed pattern.
    pub fn new(name: impl Into<String>, pattern: QueuePattern) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.to_string(),
        }
    }

    /// Parses the declared pattern flags.
    pub fn parsed_pattern(&self) -> Result<QueuePattern, crate::domain::SyncError> {
        self.pattern.parse()
    }
}

/// A single configuration validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl StoreConfig {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StoreConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`StoreConfig::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/medrelay/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("medrelay")
            .join("config.yaml")
    }

    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.database.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "database.path".into(),
                message: "must not be empty".into(),
            });
        }
        if self.blobs.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "blobs.root".into(),
                message: "must not be empty".into(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for (i, queue) in self.queues.iter().enumerate() {
            if queue.name.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("queues[{i}].name"),
                    message: "must not be empty".into(),
                });
            }
            if !seen.insert(queue.name.to_lowercase()) {
                errors.push(ValidationError {
                    field: format!("queues[{i}].name"),
                    message: format!("duplicate queue name '{}'", queue.name),
                });
            }
            if let Err(e) = queue.parsed_pattern() {
                errors.push(ValidationError {
                    field: format!("queues[{i}].pattern"),
                    message: e.to_string(),
                });
            }
        }

        errors
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("medrelay")
                .join("store.db"),
        }
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("medrelay")
                .join("blobs"),
        }
    }
}
