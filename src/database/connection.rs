//! Live connection handles
//!
//! The router never executes SQL. It only needs to open a handle for an
//! alias and close it again when an ephemeral database goes away, so the
//! host framework plugs its own pool in through [`Connector`].

use crate::database::config::DatabaseConnectionConfig;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A live connection (or pool) owned by the registry
pub trait DatabaseConnection: Send + Sync {
    /// Alias this connection was opened for
    fn alias(&self) -> &str;

    /// Close the connection. May block on I/O.
    fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;

    /// Access the concrete connection for downcasting
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Opens connections from configuration
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        alias: &str,
        config: &DatabaseConnectionConfig,
    ) -> Result<Arc<dyn DatabaseConnection>>;
}

/// Connector that performs no I/O; connections only track open/closed state
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedConnector;

impl Connector for DetachedConnector {
    fn connect(
        &self,
        alias: &str,
        config: &DatabaseConnectionConfig,
    ) -> Result<Arc<dyn DatabaseConnection>> {
        log::debug!(
            "Opening detached connection '{}' ({})",
            alias,
            config.sanitized_url()
        );
        let url = config.url().unwrap_or_default();
        Ok(Arc::new(DetachedConnection::new(alias, url)))
    }
}

/// Connection handle produced by [`DetachedConnector`]
#[derive(Debug)]
pub struct DetachedConnection {
    alias: String,
    url: String,
    closed: AtomicBool,
}

impl DetachedConnection {
    pub fn new(alias: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            url: url.into(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DatabaseConnection for DetachedConnection {
    fn alias(&self) -> &str {
        &self.alias
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
