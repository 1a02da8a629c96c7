//! Per-context read/write alias cells
//!
//! Each logical execution context sees its own pair of aliases. Inside an
//! alias task scope (entered by [`propagate`], [`spawn`] or an async
//! override) the pair lives in a tokio task-local and travels with the task
//! across worker threads. Everywhere else it lives in a thread-local.
//!
//! Tasks started with a plain `tokio::spawn` do not inherit the caller's
//! aliases. Use [`spawn`] or wrap the future with [`propagate`].

use once_cell::sync::OnceCell;
use std::cell::RefCell;
use std::future::Future;

/// Alias used when no override is active and none was configured
pub const DEFAULT_DB_ALIAS: &str = "default";

static DEFAULT_ALIAS: OnceCell<String> = OnceCell::new();

thread_local! {
    static THREAD_ALIASES: RefCell<AliasSnapshot> = RefCell::new(AliasSnapshot::initial());
}

tokio::task_local! {
    static TASK_ALIASES: RefCell<AliasSnapshot>;
}

/// The aliases currently selected for reads and writes
///
/// An axis that no override has touched stays unset and resolves to
/// [`default_alias`] whenever it is read, so configuring the default after a
/// thread has already looked at its cell still takes effect there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasSnapshot {
    pub(crate) read: Option<String>,
    pub(crate) write: Option<String>,
}

impl AliasSnapshot {
    pub fn new(read: impl Into<String>, write: impl Into<String>) -> Self {
        Self {
            read: Some(read.into()),
            write: Some(write.into()),
        }
    }

    /// Both axes following the configured default alias
    pub fn initial() -> Self {
        Self::default()
    }

    pub fn read(&self) -> &str {
        self.read.as_deref().unwrap_or_else(|| default_alias())
    }

    pub fn write(&self) -> &str {
        self.write.as_deref().unwrap_or_else(|| default_alias())
    }
}

/// The process-wide fallback alias
pub fn default_alias() -> &'static str {
    DEFAULT_ALIAS
        .get()
        .map(String::as_str)
        .unwrap_or(DEFAULT_DB_ALIAS)
}

/// Configure the fallback alias. Only the first call wins.
pub fn set_default_alias(alias: impl Into<String>) -> bool {
    let alias = alias.into();
    match DEFAULT_ALIAS.set(alias) {
        Ok(()) => true,
        Err(rejected) => {
            log::warn!(
                "Default database alias already set to '{}', ignoring '{}'",
                default_alias(),
                rejected
            );
            false
        }
    }
}

fn in_task_scope() -> bool {
    TASK_ALIASES.try_with(|_| ()).is_ok()
}

/// Run `f` against the cell of the current context
pub(crate) fn with_current<R>(f: impl FnOnce(&mut AliasSnapshot) -> R) -> R {
    if in_task_scope() {
        TASK_ALIASES.with(|cell| f(&mut cell.borrow_mut()))
    } else {
        THREAD_ALIASES.with(|cell| f(&mut cell.borrow_mut()))
    }
}

/// Alias that read operations resolve to right now
pub fn current_read() -> String {
    with_current(|aliases| aliases.read().to_string())
}

/// Alias that write operations resolve to right now
pub fn current_write() -> String {
    with_current(|aliases| aliases.write().to_string())
}

pub fn snapshot() -> AliasSnapshot {
    with_current(|aliases| aliases.clone())
}

/// Overwrite the current context's aliases, returning the previous pair
pub(crate) fn replace(next: AliasSnapshot) -> AliasSnapshot {
    with_current(|aliases| std::mem::replace(aliases, next))
}

/// Run `fut` in its own alias scope seeded with `aliases`
pub async fn scoped<F>(aliases: AliasSnapshot, fut: F) -> F::Output
where
    F: Future,
{
    TASK_ALIASES.scope(RefCell::new(aliases), fut).await
}

/// Wrap `fut` so that it runs with the caller's current aliases, wherever
/// it is eventually polled
pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let aliases = snapshot();
    TASK_ALIASES.scope(RefCell::new(aliases), fut)
}

/// `tokio::spawn` that inherits the caller's aliases
pub fn spawn<F>(fut: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(propagate(fut))
}

/// `tokio::task::spawn_blocking` that inherits the caller's aliases
pub fn spawn_blocking<F, R>(f: F) -> tokio::task::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let aliases = snapshot();
    tokio::task::spawn_blocking(move || {
        let _restore = ThreadCellRestore(THREAD_ALIASES.with(|cell| cell.replace(aliases)));
        f()
    })
}

/// Puts a blocking-pool thread's previous aliases back once the closure ends
struct ThreadCellRestore(AliasSnapshot);

impl Drop for ThreadCellRestore {
    fn drop(&mut self) {
        let previous = std::mem::take(&mut self.0);
        THREAD_ALIASES.with(|cell| cell.replace(previous));
    }
}
