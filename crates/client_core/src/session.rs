use std::{sync::Arc, time::Duration};

use shared::domain::WindowMode;
use tracing::{debug, error, info, warn};

use crate::{
    dispatch::CommandDispatcher,
    error::ClientError,
    registry::{Shutdown, WindowRegistry},
    window::Window,
    EditorHost, EditorWindow, RemoteFs,
};

const WINDOW_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Process-wide context shared by every window: the remote tree, the editor
/// and the window registry.
pub struct Session {
    fsys: Arc<dyn RemoteFs>,
    host: Arc<dyn EditorHost>,
    registry: WindowRegistry,
    dispatcher: CommandDispatcher,
}

impl Session {
    pub fn new(
        fsys: Arc<dyn RemoteFs>,
        host: Arc<dyn EditorHost>,
        shutdown: Arc<dyn Shutdown>,
    ) -> Arc<Self> {
        Arc::new(Self {
            dispatcher: CommandDispatcher::new(Arc::clone(&fsys)),
            fsys,
            host,
            registry: WindowRegistry::new(shutdown),
        })
    }

    pub fn fsys(&self) -> &dyn RemoteFs {
        self.fsys.as_ref()
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Like [`Session::show_or_create`], but a window that cannot be created
    /// ends the process through [`Shutdown::abort`].
    pub async fn open(self: &Arc<Self>, mode: WindowMode) -> Option<Arc<Window>> {
        match self.show_or_create(mode).await {
            Ok(window) => window,
            Err(err) => {
                error!(error = %err, "giving up on window creation");
                self.registry.abort(&err).await;
                None
            }
        }
    }

    /// Focuses the editor window already titled for `mode`, or creates,
    /// registers and starts a new one. Returns the new window, if any.
    ///
    /// The title check and the creation are not atomic: two concurrent
    /// requests for the same title can both create a window.
    pub async fn show_or_create(
        self: &Arc<Self>,
        mode: WindowMode,
    ) -> Result<Option<Arc<Window>>, ClientError> {
        let title = mode.title();
        match self.host.show(&title).await {
            Ok(true) => {
                debug!(%title, "focused existing window");
                return Ok(None);
            }
            Ok(false) => {}
            Err(err) => debug!(%title, error = %err, "window lookup failed"),
        }

        let handle = self.create_editor_window(&title).await?;
        if let Err(err) = handle.set_title(&title).await {
            debug!(%title, error = %err, "naming window failed");
        }
        let window = Arc::new(Window::new(mode, handle, Arc::clone(self)));
        self.registry.register(Arc::clone(&window)).await;
        window.reset_tag().await;
        info!(%title, window = %window.id(), "opened window");

        if window.mode().is_timeline() {
            let loader = Arc::clone(&window);
            tokio::spawn(async move { loader.refresh().await });
        }
        let events = Arc::clone(&window);
        tokio::spawn(events.run());
        Ok(Some(window))
    }

    async fn create_editor_window(
        &self,
        title: &str,
    ) -> Result<Arc<dyn EditorWindow>, ClientError> {
        match self.host.create_window().await {
            Ok(handle) => Ok(handle),
            Err(err) => {
                warn!(%title, error = %err, "creating window failed; retrying once");
                tokio::time::sleep(WINDOW_RETRY_DELAY).await;
                self.host
                    .create_window()
                    .await
                    .map_err(|source| ClientError::WindowCreation {
                        title: title.to_string(),
                        source,
                    })
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
