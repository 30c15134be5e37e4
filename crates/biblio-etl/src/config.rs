//! Application configuration.
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables, so deployments can keep credentials out of the
//! file entirely.

use std::fs;
use std::path::{Path, PathBuf};

use biblio_core::{BiblioResult, SyncError};
use biblio_graph::{GraphConfig, SamplerConfig};
use serde::Deserialize;
use tracing::debug;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "biblio.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/library.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/warehouse.db"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub warehouse: WarehouseConfig,
    pub graph: GraphConfig,
    pub sampler: SamplerConfig,
}

impl AppConfig {
    /// Load `explicit` (which must exist), else `biblio.toml` when present,
    /// else defaults; then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> BiblioResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> BiblioResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {e}", path.display())))?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_toml_str(&contents)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(contents: &str) -> BiblioResult<Self> {
        toml::from_str(contents).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Override fields from `lookup`, normally the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("BIBLIO_SOURCE_DB") {
            self.source.path = PathBuf::from(path);
        }
        if let Some(path) = lookup("BIBLIO_WAREHOUSE_DB") {
            self.warehouse.path = PathBuf::from(path);
        }
        if let Some(uri) = lookup("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Some(user) = lookup("NEO4J_USER") {
            self.graph.user = user;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            self.graph.password = password;
        }
        if let Some(database) = lookup("NEO4J_DATABASE") {
            self.graph.database = database;
        }
    }
}
