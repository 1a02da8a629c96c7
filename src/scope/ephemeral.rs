//! Lifecycle of inline connection configurations
//!
//! An override built from a full configuration registers it under a fresh
//! UUID alias. Clones of the override share one [`EphemeralDatabase`]; the
//! registration is torn down (connection closed, alias removed) when the
//! last active scope exits, and restored if the override is entered again.

use crate::database::config::DatabaseConnectionConfig;
use crate::database::registry::ConnectionRegistry;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Where an async scope runs the possibly blocking teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeardownMode {
    /// On tokio's blocking pool, awaited before the scope returns
    #[default]
    Blocking,
    /// Directly on the task that exits the scope
    Inline,
}

impl TeardownMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeardownMode::Blocking => "blocking",
            TeardownMode::Inline => "inline",
        }
    }
}

impl FromStr for TeardownMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "blocking" => Ok(TeardownMode::Blocking),
            "inline" => Ok(TeardownMode::Inline),
            other => Err(Error::config(format!(
                "Invalid teardown mode '{}'. Use 'blocking' or 'inline'.",
                other
            ))),
        }
    }
}

#[derive(Debug)]
struct EphemeralState {
    active: usize,
    registered: bool,
}

/// A connection configuration registered for the lifetime of an override
pub(crate) struct EphemeralDatabase {
    id: String,
    config: DatabaseConnectionConfig,
    registry: Arc<dyn ConnectionRegistry>,
    state: Mutex<EphemeralState>,
}

impl EphemeralDatabase {
    /// Register `config` under a newly generated alias
    pub(crate) fn register(
        config: DatabaseConnectionConfig,
        registry: Arc<dyn ConnectionRegistry>,
    ) -> Arc<Self> {
        let id = uuid::Uuid::new_v4().to_string();
        log::debug!(
            "Registering ephemeral database '{}': {}",
            id,
            config.sanitized_url()
        );
        registry.register(&id, config.clone());

        Arc::new(Self {
            id,
            config,
            registry,
            state: Mutex::new(EphemeralState {
                active: 0,
                registered: true,
            }),
        })
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> MutexGuard<'_, EphemeralState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark one more active scope, re-registering after an earlier teardown
    ///
    /// Released with `mode` when the lease is dropped without
    /// [`Lease::finish`] (panic, cancellation, sync guards).
    pub(crate) fn acquire(self: &Arc<Self>, mode: TeardownMode) -> Lease {
        let mut state = self.state();
        if !state.registered {
            log::debug!("Re-registering ephemeral database '{}'", self.id);
            self.registry.register(&self.id, self.config.clone());
            state.registered = true;
        }
        state.active += 1;
        Lease {
            ephemeral: Some(Arc::clone(self)),
            mode,
        }
    }

    /// Drop one active scope; the last one out tears the registration down
    ///
    /// The state lock is not held while the connection closes. A scope that
    /// enters meanwhile keeps the registration alive.
    fn release(&self) {
        {
            let mut state = self.state();
            state.active = state.active.saturating_sub(1);
            if state.active > 0 || !state.registered {
                return;
            }
            state.registered = false;
        }

        if let Err(e) = self.registry.close(&self.id) {
            log::warn!("Failed to close ephemeral database '{}': {}", self.id, e);
        }

        let state = self.state();
        if state.active == 0 && !state.registered {
            self.deregister();
        } else {
            log::debug!("Ephemeral database '{}' re-entered during teardown", self.id);
        }
    }

    fn teardown(&self) {
        if let Err(e) = self.registry.close(&self.id) {
            log::warn!("Failed to close ephemeral database '{}': {}", self.id, e);
        }
        self.deregister();
    }

    fn deregister(&self) {
        self.registry.deregister(&self.id);
        log::debug!("Removed ephemeral database '{}'", self.id);
    }
}

impl Drop for EphemeralDatabase {
    fn drop(&mut self) {
        let registered = self
            .state
            .get_mut()
            .map(|state| state.registered)
            .unwrap_or_else(|poisoned| poisoned.into_inner().registered);
        if registered {
            self.teardown();
        }
    }
}

/// One active use of an ephemeral database
pub(crate) struct Lease {
    ephemeral: Option<Arc<EphemeralDatabase>>,
    mode: TeardownMode,
}

impl Lease {
    /// Release from async code and wait for the teardown to finish. In
    /// `Blocking` mode the work runs on tokio's blocking pool.
    pub(crate) async fn finish(mut self) {
        let Some(ephemeral) = self.ephemeral.take() else {
            return;
        };

        match (self.mode, tokio::runtime::Handle::try_current()) {
            (TeardownMode::Blocking, Ok(handle)) => {
                let id = ephemeral.id().to_string();
                if let Err(e) = handle.spawn_blocking(move || ephemeral.release()).await {
                    log::error!("Teardown of ephemeral database '{}' failed: {}", id, e);
                }
            }
            _ => ephemeral.release(),
        }
    }
}

impl Drop for Lease {
    // Nothing can be awaited here; in `Blocking` mode inside a runtime the
    // teardown is handed to the blocking pool without waiting for it
    fn drop(&mut self) {
        let Some(ephemeral) = self.ephemeral.take() else {
            return;
        };

        match (self.mode, tokio::runtime::Handle::try_current()) {
            (TeardownMode::Blocking, Ok(handle)) => {
                log::debug!(
                    "Ephemeral database '{}' released without completing its scope",
                    ephemeral.id()
                );
                drop(handle.spawn_blocking(move || ephemeral.release()));
            }
            _ => ephemeral.release(),
        }
    }
}
