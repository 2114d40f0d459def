//! Configuration system for backr.
//!
//! A single YAML file declares global locations and the set of models.
//! Search order:
//! 1. Explicit `--config` path
//! 2. ~/.config/backr/backr.yml
//! 3. /etc/backr/backr.yml
//! 4. ./backr.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use self::model::{ArchiveConfig, ModelConfig, SubConfig, de_lenient_string};
pub use self::spec::{Environment, ModelSpec};

mod model;
mod spec;

const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,

    /// Root for per-run temp directories (defaults to the OS temp dir).
    pub temp_dir: Option<String>,

    /// Directory for retention ledgers.
    pub ledger_dir: Option<String>,

    pub models: BTreeMap<String, ModelConfig>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        eyre::bail!("No config file found, tried: {:?}", Self::search_paths())
    }

    fn search_paths() -> Vec<PathBuf> {
        let file_name = format!("{}.yml", PROJECT_NAME);
        let mut paths = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(PROJECT_NAME).join(&file_name));
        }
        paths.push(PathBuf::from("/etc").join(PROJECT_NAME).join(&file_name));
        paths.push(PathBuf::from(&file_name));
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config = Self::from_yaml(&content)?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            eyre::bail!("no models configured");
        }
        for name in self.models.keys() {
            if name.trim().is_empty() {
                eyre::bail!("model names must not be empty");
            }
            if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
                eyre::bail!("model name `{}` must be usable as a file name", name);
            }
        }
        Ok(())
    }

    /// Resolve the explicit locations the coordinator and cycler work with.
    pub fn environment(&self) -> Environment {
        let defaults = Environment::default();
        Environment {
            temp_root: self
                .temp_dir
                .as_deref()
                .map(|dir| crate::helper::expand_home(dir).join(PROJECT_NAME))
                .unwrap_or(defaults.temp_root),
            ledger_dir: self
                .ledger_dir
                .as_deref()
                .map(crate::helper::expand_home)
                .unwrap_or(defaults.ledger_dir),
        }
    }

    /// Look up a model by name.
    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.get(name)
    }

    /// Model names in a stable order.
    pub fn model_names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }
}
