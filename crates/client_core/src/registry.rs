use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use shared::domain::WindowId;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{error::ClientError, window::Window};

/// How the process ends.
#[async_trait]
pub trait Shutdown: Send + Sync {
    /// Called once, when the last window has closed: release the remote tree
    /// and exit successfully.
    async fn finish(&self);
    /// Called when the client cannot continue, e.g. the editor refused to
    /// create a window twice.
    async fn abort(&self, error: &ClientError);
}

#[derive(Default)]
struct RegistryState {
    windows: HashMap<WindowId, Arc<Window>>,
    drained: bool,
}

/// Live windows of this process, keyed by editor window id.
///
/// The lock is held only for the map operation itself, never across editor
/// or remote I/O.
pub struct WindowRegistry {
    state: Mutex<RegistryState>,
    shutdown: Arc<dyn Shutdown>,
}

impl WindowRegistry {
    pub fn new(shutdown: Arc<dyn Shutdown>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            shutdown,
        }
    }

    pub async fn register(&self, window: Arc<Window>) {
        let id = window.id();
        let replaced = self.state.lock().await.windows.insert(id, window);
        if replaced.is_some() {
            debug!(window = %id, "replaced stale registry entry");
        }
    }

    /// Removes `window` if it is still the entry registered under its id.
    ///
    /// When this empties the registry, [`Shutdown::finish`] runs. That is
    /// the only way the process ends normally, and it happens at most once.
    /// Returns whether this call drained the registry.
    pub async fn unregister(&self, window: &Arc<Window>) -> bool {
        let id = window.id();
        let drained = {
            let mut state = self.state.lock().await;
            let current = state
                .windows
                .get(&id)
                .is_some_and(|entry| Arc::ptr_eq(entry, window));
            if current {
                state.windows.remove(&id);
            }
            let drained = current && state.windows.is_empty() && !state.drained;
            if drained {
                state.drained = true;
            }
            drained
        };

        if drained {
            info!(window = %id, "last window closed; shutting down");
            self.shutdown.finish().await;
        } else {
            debug!(window = %id, "window closed");
        }
        drained
    }

    pub async fn abort(&self, error: &ClientError) {
        self.shutdown.abort(error).await;
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.windows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self
            .state
            .lock()
            .await
            .windows
            .values()
            .map(|window| window.title())
            .collect();
        titles.sort();
        titles
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
