//! Multi-database support module
//!
//! Named connection configurations, the registry that owns them, and the
//! connection handles the registry hands out.

pub mod config;
pub mod connection;
pub mod registry;

// Re-export main types for convenience
pub use config::{DatabaseConnectionConfig, DatabasesConfig};
pub use connection::{Connector, DatabaseConnection, DetachedConnection, DetachedConnector};
pub use registry::{ConnectionRegistry, DatabaseRegistry, RegistryStats};
