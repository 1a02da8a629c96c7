//! Database registry for managing multiple named connections
//!
//! The registry maps aliases to connection configurations and lazily opens
//! a live connection per alias. Scoped overrides use it through the narrow
//! [`ConnectionRegistry`] trait: register an inline configuration under a
//! generated alias, then close and drop it again on exit.

use crate::database::config::{DatabaseConnectionConfig, DatabasesConfig};
use crate::database::connection::{Connector, DatabaseConnection, DetachedConnector};
use crate::error::{ErrorContext, OptionExt, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// The part of the host connection layer that scoped overrides rely on
pub trait ConnectionRegistry: Send + Sync {
    /// Insert (or replace) the configuration stored under `alias`
    fn register(&self, alias: &str, config: DatabaseConnectionConfig);

    /// Remove the configuration stored under `alias`
    fn deregister(&self, alias: &str) -> Option<DatabaseConnectionConfig>;

    /// Close the live connection for `alias`, if one is open
    fn close(&self, alias: &str) -> Result<()>;

    fn contains(&self, alias: &str) -> bool;
}

/// Registry for managing multiple database connections
pub struct DatabaseRegistry {
    /// Map of alias to configuration
    configs: DashMap<String, DatabaseConnectionConfig>,
    /// Connections opened so far, keyed by alias
    connections: DashMap<String, Arc<dyn DatabaseConnection>>,
    connector: Arc<dyn Connector>,
}

impl DatabaseRegistry {
    /// Create a new empty registry backed by [`DetachedConnector`]
    pub fn new() -> Self {
        Self::with_connector(Arc::new(DetachedConnector))
    }

    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            configs: DashMap::new(),
            connections: DashMap::new(),
            connector,
        }
    }

    /// Build a registry holding every database from `config`
    pub fn from_config(config: &DatabasesConfig, connector: Arc<dyn Connector>) -> Self {
        let registry = Self::with_connector(connector);
        registry.register_all(config);
        registry
    }

    pub fn register_all(&self, config: &DatabasesConfig) {
        for (alias, db_config) in &config.databases {
            log::info!(
                "Registering database '{}': {}",
                alias,
                db_config.sanitized_url()
            );
            self.configs.insert(alias.clone(), db_config.clone());
        }
    }

    /// Get a copy of the configuration registered under `alias`
    pub fn config(&self, alias: &str) -> Option<DatabaseConnectionConfig> {
        self.configs.get(alias).map(|entry| entry.value().clone())
    }

    /// Get the live connection for `alias`, opening it on first use
    ///
    /// The connector runs without any registry lock held. If two callers
    /// race to open the same alias, the first insert wins and the other
    /// connection is closed.
    pub fn connection(&self, alias: &str) -> Result<Arc<dyn DatabaseConnection>> {
        if let Some(conn) = self.connections.get(alias) {
            return Ok(conn.value().clone());
        }

        let config = self.config(alias).or_not_found(alias)?;
        let conn = self
            .connector
            .connect(alias, &config)
            .with_context(|| format!("Failed to open database '{}'", alias))?;

        let existing = match self.connections.entry(alias.to_string()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(conn.clone());
                None
            }
        };

        match existing {
            Some(existing) => {
                if let Err(e) = conn.close() {
                    log::warn!("Failed to close duplicate connection '{}': {}", alias, e);
                }
                Ok(existing)
            }
            None => Ok(conn),
        }
    }

    /// True if a connection is currently open for `alias`
    pub fn is_open(&self, alias: &str) -> bool {
        self.connections.contains_key(alias)
    }

    /// List all registered aliases, sorted
    pub fn list_databases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Close every open connection, keeping the configurations
    pub fn close_all(&self) {
        let aliases: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        for alias in aliases {
            if let Err(e) = ConnectionRegistry::close(self, &alias) {
                log::warn!("Failed to close database '{}': {}", alias, e);
            }
        }
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_databases: self.configs.len(),
            open_connections: self.connections.len(),
            database_names: self.list_databases(),
        }
    }
}

impl ConnectionRegistry for DatabaseRegistry {
    fn register(&self, alias: &str, config: DatabaseConnectionConfig) {
        log::debug!(
            "Registering database '{}': {}",
            alias,
            config.sanitized_url()
        );
        self.configs.insert(alias.to_string(), config);
    }

    fn deregister(&self, alias: &str) -> Option<DatabaseConnectionConfig> {
        if let Some((_, conn)) = self.connections.remove(alias) {
            if !conn.is_closed() {
                log::warn!("Database '{}' deregistered while still open", alias);
                if let Err(e) = conn.close() {
                    log::warn!("Failed to close database '{}': {}", alias, e);
                }
            }
        }
        let removed = self.configs.remove(alias).map(|(_, config)| config);
        if removed.is_some() {
            log::debug!("Deregistered database '{}'", alias);
        }
        removed
    }

    fn close(&self, alias: &str) -> Result<()> {
        match self.connections.remove(alias) {
            Some((_, conn)) => {
                log::debug!("Closing database '{}'", alias);
                conn.close()
                    .with_context(|| format!("Failed to close database '{}'", alias))
            }
            None => Ok(()),
        }
    }

    fn contains(&self, alias: &str) -> bool {
        self.configs.contains_key(alias)
    }
}

/// Statistics about the database registry
#[derive(Debug, Clone)]
pub struct RegistryStats {
    /// Total number of registered databases
    pub total_databases: usize,
    /// Number of aliases with an open connection
    pub open_connections: usize,
    /// List of all database aliases
    pub database_names: Vec<String>,
}

impl Default for DatabaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}
