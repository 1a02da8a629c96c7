//! Scoped database overrides
//!
//! [`InDatabase`] redirects the read alias, the write alias, or both, for
//! the duration of a block, a function call or a future, and puts the
//! previous aliases back when that region ends, whether it returned, failed
//! or panicked.
//!
//! ```rust,ignore
//! use rustf_db_router::InDatabase;
//!
//! let total = InDatabase::new("replica").call(|| Invoice::count());
//!
//! InDatabase::new("primary")
//!     .write(true)
//!     .scope(async { invoice.save().await })
//!     .await?;
//! ```

pub mod ephemeral;

use crate::database::config::DatabaseConnectionConfig;
use crate::database::registry::ConnectionRegistry;
use crate::db::DB;
use crate::error::{Error, Result};
use crate::routing::aliases::{self, AliasSnapshot};
use ephemeral::{EphemeralDatabase, Lease};
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

pub use ephemeral::TeardownMode;

/// The database an override points at
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseSpec {
    /// Alias of a database already known to the registry
    Alias(String),
    /// Complete configuration, registered as-is under a generated alias
    Config(DatabaseConnectionConfig),
}

impl From<&str> for DatabaseSpec {
    fn from(alias: &str) -> Self {
        DatabaseSpec::Alias(alias.to_string())
    }
}

impl From<String> for DatabaseSpec {
    fn from(alias: String) -> Self {
        DatabaseSpec::Alias(alias)
    }
}

impl From<&String> for DatabaseSpec {
    fn from(alias: &String) -> Self {
        DatabaseSpec::Alias(alias.clone())
    }
}

impl From<DatabaseConnectionConfig> for DatabaseSpec {
    fn from(config: DatabaseConnectionConfig) -> Self {
        DatabaseSpec::Config(config)
    }
}

impl TryFrom<Value> for DatabaseSpec {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(alias) => Ok(DatabaseSpec::Alias(alias)),
            Value::Object(map) => Ok(DatabaseSpec::Config(map.into())),
            other => Err(Error::invalid_database(format!(
                "database must be an alias (string) for an existing database, \
                 or a complete configuration (mapping), got {}",
                value_kind(&other)
            ))),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}

/// A scoped read/write alias override
///
/// Reads are redirected by default, writes are not. Clones share the same
/// ephemeral registration, so a cloned override may be entered from several
/// tasks at once.
#[derive(Clone)]
pub struct InDatabase {
    target: String,
    read: bool,
    write: bool,
    teardown: TeardownMode,
    ephemeral: Option<Arc<EphemeralDatabase>>,
}

impl InDatabase {
    /// Build an override against the global registry (see [`DB::registry`])
    pub fn new(database: impl Into<DatabaseSpec>) -> Self {
        Self::with_registry(database, DB::registry())
    }

    /// Build an override whose inline configuration (if any) goes into
    /// `registry`
    pub fn with_registry(
        database: impl Into<DatabaseSpec>,
        registry: Arc<dyn ConnectionRegistry>,
    ) -> Self {
        let (target, ephemeral) = match database.into() {
            DatabaseSpec::Alias(alias) => (alias, None),
            DatabaseSpec::Config(config) => {
                let ephemeral = EphemeralDatabase::register(config, registry);
                (ephemeral.id().to_string(), Some(ephemeral))
            }
        };

        Self {
            target,
            read: true,
            write: false,
            teardown: DB::teardown_mode(),
            ephemeral,
        }
    }

    /// Build an override from a dynamically typed value: a string alias or
    /// a configuration mapping. Anything else fails with
    /// [`Error::InvalidDatabase`] before anything is registered.
    pub fn from_value(database: Value) -> Result<Self> {
        Self::from_value_in(database, DB::registry())
    }

    pub fn from_value_in(database: Value, registry: Arc<dyn ConnectionRegistry>) -> Result<Self> {
        let spec = DatabaseSpec::try_from(database)?;
        Ok(Self::with_registry(spec, registry))
    }

    /// Redirect reads (default `true`)
    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    /// Redirect writes (default `false`)
    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub fn teardown(mut self, mode: TeardownMode) -> Self {
        self.teardown = mode;
        self
    }

    /// Alias this override redirects to
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn reads(&self) -> bool {
        self.read
    }

    pub fn writes(&self) -> bool {
        self.write
    }

    pub fn owns_ephemeral_config(&self) -> bool {
        self.ephemeral.is_some()
    }

    /// Generated alias of the inline configuration, if this override owns one
    pub fn ephemeral_id(&self) -> Option<&str> {
        self.ephemeral.as_deref().map(EphemeralDatabase::id)
    }

    fn apply_to(&self, current: &AliasSnapshot) -> AliasSnapshot {
        AliasSnapshot {
            read: if self.read {
                Some(self.target.clone())
            } else {
                current.read.clone()
            },
            write: if self.write {
                Some(self.target.clone())
            } else {
                current.write.clone()
            },
        }
    }

    fn lease(&self, mode: TeardownMode) -> Option<Lease> {
        self.ephemeral
            .as_ref()
            .map(|ephemeral| ephemeral.acquire(mode))
    }

    /// Activate the override in the current context until the returned
    /// guard is dropped
    pub fn enter(&self) -> OverrideGuard<'_> {
        // a sync exit has nothing to await, so the teardown happens on drop
        let lease = self.lease(TeardownMode::Inline);
        let saved = aliases::with_current(|current| {
            let next = self.apply_to(current);
            std::mem::replace(current, next)
        });
        log::trace!(
            "Entered database override '{}' (read: {}, write: {})",
            self.target,
            self.read,
            self.write
        );

        OverrideGuard {
            scope: self,
            saved,
            lease,
            _not_send: PhantomData,
        }
    }

    /// Run `f` with the override active
    pub fn call<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    /// Wrap `f` so that every call runs inside a fresh activation of this
    /// override. Arguments and results pass through unchanged; use a tuple
    /// for several arguments.
    pub fn wrap<A, R, F>(self, f: F) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
    {
        move |args| self.call(|| f(args))
    }

    /// Await `fut` with the override active
    ///
    /// The aliases are restored as soon as `fut` completes. An ephemeral
    /// configuration is then torn down according to the teardown mode and
    /// this future resolves only once that teardown has finished. If `fut`
    /// panics or this future is dropped early, a `Blocking` teardown is
    /// still handed to the blocking pool but nobody waits for it.
    pub async fn scope<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        let lease = self.lease(self.teardown);
        let next = self.apply_to(&aliases::snapshot());
        log::trace!(
            "Entered async database override '{}' (read: {}, write: {})",
            self.target,
            self.read,
            self.write
        );

        let output = aliases::scoped(next, fut).await;

        if let Some(lease) = lease {
            lease.finish().await;
        }
        output
    }

    /// Async counterpart of [`InDatabase::wrap`]
    pub fn wrap_async<A, F, Fut>(self, f: F) -> impl Fn(A) -> BoxFuture<'static, Fut::Output>
    where
        F: Fn(A) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        move |args| {
            let scope = self.clone();
            let fut = f(args);
            let wrapped: BoxFuture<'static, Fut::Output> =
                Box::pin(async move { scope.scope(fut).await });
            wrapped
        }
    }
}

impl std::fmt::Debug for InDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InDatabase")
            .field("target", &self.target)
            .field("read", &self.read)
            .field("write", &self.write)
            .field("teardown", &self.teardown)
            .field("owns_ephemeral_config", &self.owns_ephemeral_config())
            .finish()
    }
}

/// An active override. Dropping it restores the aliases observed on entry.
///
/// The guard must stay on the thread that created it.
pub struct OverrideGuard<'a> {
    scope: &'a InDatabase,
    saved: AliasSnapshot,
    lease: Option<Lease>,
    _not_send: PhantomData<*const ()>,
}

impl<'a> OverrideGuard<'a> {
    /// The override this guard belongs to
    pub fn scope(&self) -> &'a InDatabase {
        self.scope
    }

    pub fn target(&self) -> &str {
        self.scope.target()
    }

    /// Aliases that were active before entry and will be restored on exit
    pub fn saved(&self) -> &AliasSnapshot {
        &self.saved
    }
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        aliases::replace(self.saved.clone());
        log::trace!("Left database override '{}'", self.scope.target);
        drop(self.lease.take());
    }
}
