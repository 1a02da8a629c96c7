//! Where and when async overrides close their inline configurations.

use futures::FutureExt;
use rustf_db_router::database::registry::ConnectionRegistry;
use rustf_db_router::{
    current_read, Connector, DatabaseConnection, DatabaseConnectionConfig, DatabaseRegistry,
    InDatabase, Result, TeardownMode,
};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Threads that closed a connection, in order
#[derive(Default)]
struct CloseLog {
    threads: Mutex<Vec<ThreadId>>,
}

impl CloseLog {
    fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().unwrap().clone()
    }
}

struct RecordingConnection {
    alias: String,
    log: Arc<CloseLog>,
    closed: AtomicBool,
}

impl DatabaseConnection for RecordingConnection {
    fn alias(&self) -> &str {
        &self.alias
    }

    fn close(&self) -> Result<()> {
        self.log.threads.lock().unwrap().push(thread::current().id());
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct RecordingConnector {
    log: Arc<CloseLog>,
}

impl Connector for RecordingConnector {
    fn connect(
        &self,
        alias: &str,
        _config: &DatabaseConnectionConfig,
    ) -> Result<Arc<dyn DatabaseConnection>> {
        Ok(Arc::new(RecordingConnection {
            alias: alias.to_string(),
            log: self.log.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

fn setup(mode: TeardownMode) -> (Arc<DatabaseRegistry>, Arc<CloseLog>, InDatabase) {
    let log = Arc::new(CloseLog::default());
    let registry = Arc::new(DatabaseRegistry::with_connector(Arc::new(
        RecordingConnector { log: log.clone() },
    )));
    let scope = InDatabase::with_registry(
        DatabaseConnectionConfig::new("sqlite::memory:"),
        registry.clone(),
    )
    .write(true)
    .teardown(mode);
    (registry, log, scope)
}

async fn wait_until_removed(registry: &DatabaseRegistry, id: &str) {
    for _ in 0..400 {
        if !registry.contains(id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("ephemeral database '{}' was never removed", id);
}

#[tokio::test]
async fn test_blocking_teardown_runs_off_executor() {
    let executor = thread::current().id();
    let (registry, log, scope) = setup(TeardownMode::Blocking);
    let id = scope.target().to_string();

    scope
        .scope(async {
            registry.connection(&id).unwrap();
        })
        .await;

    assert!(!registry.contains(&id));
    assert_eq!(log.threads().len(), 1);
    assert_ne!(log.threads()[0], executor);
}

#[tokio::test]
async fn test_inline_teardown_runs_on_executor() {
    let executor = thread::current().id();
    let (registry, log, scope) = setup(TeardownMode::Inline);
    let id = scope.target().to_string();

    scope
        .scope(async {
            tokio::task::yield_now().await;
            registry.connection(&id).unwrap();
        })
        .await;

    assert!(!registry.contains(&id));
    assert_eq!(log.threads(), vec![executor]);
}

#[tokio::test]
async fn test_teardown_after_panic_runs_off_executor() {
    let executor = thread::current().id();
    let (registry, log, scope) = setup(TeardownMode::Blocking);
    let id = scope.target().to_string();

    let outcome = AssertUnwindSafe(scope.scope(async {
        registry.connection(&id).unwrap();
        tokio::task::yield_now().await;
        panic!("query failed");
    }))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert_eq!(current_read(), "default");

    wait_until_removed(&registry, &id).await;
    assert_eq!(log.threads().len(), 1);
    assert_ne!(log.threads()[0], executor);
}

#[tokio::test]
async fn test_cancelled_scope_is_torn_down_off_executor() {
    let executor = thread::current().id();
    let (registry, log, scope) = setup(TeardownMode::Blocking);
    let id = scope.target().to_string();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(20),
        scope.scope(async {
            registry.connection(&id).unwrap();
            std::future::pending::<()>().await;
        }),
    )
    .await;

    assert!(timed_out.is_err());
    assert_eq!(current_read(), "default");

    wait_until_removed(&registry, &id).await;
    assert_eq!(log.threads().len(), 1);
    assert_ne!(log.threads()[0], executor);
}

#[tokio::test]
async fn test_sync_guard_in_runtime_tears_down_before_returning() {
    let executor = thread::current().id();
    let (registry, log, scope) = setup(TeardownMode::Blocking);
    let id = scope.target().to_string();

    scope.call(|| {
        registry.connection(&id).unwrap();
    });

    assert!(!registry.contains(&id));
    assert_eq!(log.threads(), vec![executor]);
}
