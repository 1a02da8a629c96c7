//! Global database access
//!
//! `DB` owns the process-wide registry that overrides register inline
//! configurations into, and the router chain the ORM consults for every
//! operation. Call [`DB::init`] once at startup; without it the registry
//! starts empty and the chain holds a single
//! [`DynamicDbRouter`](crate::routing::DynamicDbRouter).

use crate::config::RouterConfig;
use crate::database::connection::{Connector, DatabaseConnection};
use crate::database::registry::DatabaseRegistry;
use crate::error::{Error, Result};
use crate::routing::aliases;
use crate::routing::router::{Hints, Model, RouterChain};
use crate::scope::TeardownMode;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Global database registry
static REGISTRY: OnceCell<Arc<DatabaseRegistry>> = OnceCell::new();

/// Router chain installed by `DB::install_routers`
static ROUTERS: OnceCell<RouterChain> = OnceCell::new();

static TEARDOWN: OnceCell<TeardownMode> = OnceCell::new();

/// Global database access point
pub struct DB;

impl DB {
    /// Initialize the global state from configuration
    ///
    /// May be called more than once (e.g. to register more databases), but
    /// the default alias and teardown mode cannot change once set.
    ///
    /// # Examples
    /// ```rust,ignore
    /// let config = RouterConfig::load()?;
    /// DB::init(config)?;
    /// ```
    pub fn init(config: RouterConfig) -> Result<()> {
        config.validate()?;

        if let Some(mode) = TEARDOWN.get() {
            if *mode != config.teardown {
                return Err(Error::config(format!(
                    "Teardown mode is already '{}'",
                    mode.as_str()
                )));
            }
        }
        if aliases::default_alias() != config.default_alias
            && !aliases::set_default_alias(config.default_alias.clone())
        {
            return Err(Error::config(format!(
                "Default alias is already '{}'",
                aliases::default_alias()
            )));
        }
        TEARDOWN.get_or_init(|| config.teardown);

        Self::registry().register_all(&config.databases);
        log::info!(
            "Database router initialized with {} database(s), default alias '{}'",
            config.databases.len(),
            config.default_alias
        );
        Ok(())
    }

    /// Initialize with the connector the host framework opens connections
    /// through. Must run before anything reads [`DB::registry`].
    pub fn init_with_connector(config: RouterConfig, connector: Arc<dyn Connector>) -> Result<()> {
        REGISTRY
            .set(Arc::new(DatabaseRegistry::with_connector(connector)))
            .map_err(|_| Error::config("Database registry has already been initialized"))?;
        Self::init(config)
    }

    /// Install the router chain consulted by [`DB::db_for_read`] and friends
    pub fn install_routers(chain: RouterChain) -> Result<()> {
        ROUTERS
            .set(chain)
            .map_err(|_| Error::config("Database routers have already been installed"))
    }

    /// Access the global registry
    pub fn registry() -> Arc<DatabaseRegistry> {
        REGISTRY
            .get_or_init(|| Arc::new(DatabaseRegistry::new()))
            .clone()
    }

    pub fn routers() -> &'static RouterChain {
        ROUTERS.get_or_init(RouterChain::dynamic)
    }

    /// Teardown mode new overrides start with
    pub fn teardown_mode() -> TeardownMode {
        TEARDOWN.get().copied().unwrap_or_default()
    }

    pub fn db_for_read(model: &dyn Model, hints: &Hints) -> String {
        Self::routers().db_for_read(model, hints)
    }

    pub fn db_for_write(model: &dyn Model, hints: &Hints) -> String {
        Self::routers().db_for_write(model, hints)
    }

    /// Connection that should serve a read of `model` right now
    pub fn reader(model: &dyn Model, hints: &Hints) -> Result<Arc<dyn DatabaseConnection>> {
        let alias = Self::db_for_read(model, hints);
        Self::registry().connection(&alias)
    }

    /// Connection that should serve a write of `model` right now
    pub fn writer(model: &dyn Model, hints: &Hints) -> Result<Arc<dyn DatabaseConnection>> {
        let alias = Self::db_for_write(model, hints);
        Self::registry().connection(&alias)
    }
}

/// One-line summary of the global router state, for debugging
pub fn database_status() -> String {
    let stats = DB::registry().stats();
    format!(
        "Databases: {} registered, {} open (read: '{}', write: '{}')",
        stats.total_databases,
        stats.open_connections,
        aliases::current_read(),
        aliases::current_write()
    )
}
