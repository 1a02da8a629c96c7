//! rustf-db-router - context-scoped database routing for RustF
//!
//! Lets application code redirect which database alias serves reads and
//! writes for a block of code, a function call or an async task:
//! - per-context read/write alias cells (thread-local, or task-local inside
//!   async scopes)
//! - `DynamicDbRouter`, the routing hook that hands those aliases to the ORM
//! - `InDatabase`, the scoped override, usable as a guard, around a closure
//!   or future, or as the `#[in_database]` attribute
//! - inline connection configurations registered for the lifetime of an
//!   override

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod config;
pub mod database;
pub mod db;
pub mod error;
pub mod routing;
pub mod scope;

// Re-export main types for public API
pub use config::RouterConfig;
pub use database::{
    ConnectionRegistry, Connector, DatabaseConnection, DatabaseConnectionConfig,
    DatabaseRegistry, DatabasesConfig, DetachedConnector,
};
pub use db::{database_status, DB};
pub use error::{Error, Result};
pub use routing::{
    current_read, current_write, default_alias, propagate, AliasSnapshot, DatabaseRouter,
    DynamicDbRouter, Hints, Model, RouterChain,
};
pub use scope::{DatabaseSpec, InDatabase, OverrideGuard, TeardownMode};

#[cfg(feature = "macros")]
pub use rustf_db_router_macros::in_database;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::routing::aliases::{spawn, spawn_blocking};
    pub use crate::{
        current_read, current_write, DatabaseConnectionConfig, DatabaseRouter, DynamicDbRouter,
        Hints, InDatabase, Model, DB,
    };

    #[cfg(feature = "macros")]
    pub use crate::in_database;
}
