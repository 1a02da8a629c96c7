//! Database configuration structures and parsing
//!
//! A `DatabaseConnectionConfig` is the complete description of one named
//! connection, kept exactly as it was written. The router never interprets
//! it beyond reading `url` for log lines; the host connector owns the
//! meaning of every key. Overrides may carry one inline, in which case it is
//! registered under a generated alias for the lifetime of the override.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Configuration for a single database connection
///
/// Any mapping is a valid configuration, including an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabaseConnectionConfig {
    settings: Map<String, Value>,
}

impl DatabaseConnectionConfig {
    /// Configuration holding only `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self::default().with("url", url.into())
    }

    /// Take a mapping as-is
    pub fn from_map(settings: Map<String, Value>) -> Self {
        Self { settings }
    }

    /// Set `key`, replacing any previous value
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// The `url` entry, when present and a string
    pub fn url(&self) -> Option<&str> {
        self.get("url").and_then(Value::as_str)
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    pub fn into_settings(self) -> Map<String, Value> {
        self.settings
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// URL with the password replaced, safe for logs
    pub fn sanitized_url(&self) -> String {
        match self.url() {
            Some(url) => sanitize_url(url),
            None => "[no URL]".to_string(),
        }
    }
}

impl From<Map<String, Value>> for DatabaseConnectionConfig {
    fn from(settings: Map<String, Value>) -> Self {
        Self::from_map(settings)
    }
}

/// Configuration for multiple databases, keyed by alias
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DatabasesConfig {
    #[serde(flatten)]
    pub databases: HashMap<String, DatabaseConnectionConfig>,
}

impl DatabasesConfig {
    pub fn new() -> Self {
        Self {
            databases: HashMap::new(),
        }
    }

    pub fn add_database(&mut self, name: impl Into<String>, config: DatabaseConnectionConfig) {
        self.databases.insert(name.into(), config);
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseConnectionConfig> {
        self.databases.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    /// List all database aliases, sorted
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Mask the password component of a connection URL
pub fn sanitize_url(url: &str) -> String {
    if let Ok(mut sanitized) = url::Url::parse(url) {
        if sanitized.password().is_some() {
            let _ = sanitized.set_password(Some("***"));
        }
        sanitized.to_string()
    } else {
        "[invalid URL]".to_string()
    }
}
