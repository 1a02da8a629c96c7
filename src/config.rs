//! Router configuration
//!
//! ```toml
//! default_alias = "default"
//! teardown = "blocking"
//!
//! [databases.default]
//! url = "postgresql://app@db-primary/main"
//!
//! [databases.replica]
//! url = "postgresql://app@db-replica/main"
//! max_connections = 20
//! ```
//!
//! Environment variables take precedence over the file:
//! `RUSTF_DB_DEFAULT_ALIAS`, `RUSTF_DB_TEARDOWN`. `RUSTF_DB_CONFIG` names
//! the file read by [`RouterConfig::load`].

use crate::database::config::DatabasesConfig;
use crate::error::{Error, ErrorContext, Result};
use crate::routing::aliases::DEFAULT_DB_ALIAS;
use crate::scope::TeardownMode;
use serde::{Deserialize, Serialize};
use std::env;

#[cfg(feature = "config")]
use std::{fs, path::Path};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Alias both cells start on
    #[serde(default = "default_alias")]
    pub default_alias: String,

    /// How async overrides tear down inline configurations
    #[serde(default)]
    pub teardown: TeardownMode,

    /// Databases registered at startup
    #[serde(default)]
    pub databases: DatabasesConfig,
}

fn default_alias() -> String {
    DEFAULT_DB_ALIAS.to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_alias: default_alias(),
            teardown: TeardownMode::default(),
            databases: DatabasesConfig::new(),
        }
    }
}

impl RouterConfig {
    /// Load from `RUSTF_DB_CONFIG` when set, then apply environment overrides
    pub fn load() -> Result<Self> {
        #[cfg(feature = "config")]
        let mut config = match env::var("RUSTF_DB_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        #[cfg(not(feature = "config"))]
        let mut config = Self::default();

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    #[cfg(feature = "config")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let content = fs::read_to_string(path_ref)
            .map_err(Error::from)
            .context(format!(
                "Failed to read config file '{}'. Make sure the file exists and is readable.",
                path_ref.display()
            ))?;

        let config = Self::from_toml_str(&content)
            .context(format!("Failed to parse config file '{}'", path_ref.display()))?;

        log::debug!(
            "Successfully loaded router configuration from: {}",
            path_ref.display()
        );
        Ok(config)
    }

    #[cfg(feature = "config")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(alias) = lookup("RUSTF_DB_DEFAULT_ALIAS") {
            self.default_alias = alias;
        }
        if let Some(mode) = lookup("RUSTF_DB_TEARDOWN") {
            self.teardown = mode.parse().map_err(|_| {
                Error::config("Invalid RUSTF_DB_TEARDOWN value. Use 'blocking' or 'inline'.")
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_alias.trim().is_empty() {
            return Err(Error::config("default_alias must not be empty"));
        }
        if !self.databases.is_empty() && self.databases.get(&self.default_alias).is_none() {
            return Err(Error::config(format!(
                "Default alias '{}' is not among the configured databases ({})",
                self.default_alias,
                self.databases.list_names().join(", ")
            )));
        }
        Ok(())
    }
}
