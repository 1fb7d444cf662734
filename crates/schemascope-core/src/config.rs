//! Configuration schema (schemascope.toml)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Warehouse error code for "Information schema query returned too much data"
pub const DEFAULT_OVERSIZED_RESULT_CODE: i64 = 90030;

/// Column name prefix the warehouse uses for clustering metadata pseudo-columns
pub const DEFAULT_CLUSTERING_COLUMN_PREFIX: &str = "sys_clustering_column";

/// Tuning for the introspection engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionSettings {
    /// Error codes that mean the schema-wide column query was too large
    #[serde(default = "default_oversized_result_codes")]
    pub oversized_result_codes: Vec<i64>,

    /// Columns whose normalized name starts with this prefix are skipped
    #[serde(default = "default_clustering_column_prefix")]
    pub clustering_column_prefix: String,
}

fn default_oversized_result_codes() -> Vec<i64> {
    vec![DEFAULT_OVERSIZED_RESULT_CODE]
}

fn default_clustering_column_prefix() -> String {
    DEFAULT_CLUSTERING_COLUMN_PREFIX.to_string()
}

impl Default for IntrospectionSettings {
    fn default() -> Self {
        Self {
            oversized_result_codes: default_oversized_result_codes(),
            clustering_column_prefix: default_clustering_column_prefix(),
        }
    }
}

impl IntrospectionSettings {
    /// Check if an error code means "result too large"
    pub fn is_oversized_code(&self, code: i64) -> bool {
        self.oversized_result_codes.contains(&code)
    }

    /// Check if a normalized column name is a clustering pseudo-column
    pub fn is_clustering_column(&self, column: &str) -> bool {
        column.starts_with(&self.clustering_column_prefix)
    }
}

/// Warehouse connection configuration (used by the CLI)
///
/// Secrets are not read from here; see the CLI's environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Warehouse type (only `snowflake` today)
    #[serde(rename = "type")]
    pub warehouse_type: String,

    /// Connection settings (account, user, warehouse, role, database, schema)
    #[serde(flatten)]
    pub settings: HashMap<String, String>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            warehouse_type: "snowflake".to_string(),
            settings: HashMap::new(),
        }
    }
}

impl WarehouseConfig {
    /// Get a connection setting
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Introspection tuning
    #[serde(default)]
    pub introspection: IntrospectionSettings,

    /// Query template overrides by template name
    #[serde(default)]
    pub queries: BTreeMap<String, String>,

    /// Warehouse connection configuration
    #[serde(default)]
    pub warehouse: Option<WarehouseConfig>,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
