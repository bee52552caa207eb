//! Window orchestration for browsing a 9P feed service from an editor.
//!
//! A [`Session`] opens one [`Window`] per remote concern (home timeline,
//! mentions, a user's timeline, a compose buffer). Each window runs its own
//! event task; the shared [`WindowRegistry`] ends the process when the last
//! window closes.

use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{DirEntry, WindowId};

pub mod dispatch;
pub mod error;
pub mod registry;
pub mod session;
pub mod timeline;
pub mod window;

pub use dispatch::CommandDispatcher;
pub use error::ClientError;
pub use registry::{Shutdown, WindowRegistry};
pub use session::Session;
pub use window::Window;

/// The remote feed tree. Implementations must tolerate concurrent calls from
/// many windows.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// Opens the directory at `path` for reading and lists every entry.
    async fn read_dir(&self, path: &str) -> anyhow::Result<Vec<DirEntry>>;
    /// Opens `path` for reading and returns one read of at most `limit` bytes.
    async fn read_chunk(&self, path: &str, limit: usize) -> anyhow::Result<Vec<u8>>;
    /// Opens `path` for writing, writes `data` in one shot and closes it.
    async fn write_file(&self, path: &str, data: &[u8]) -> anyhow::Result<()>;
    async fn stat(&self, path: &str) -> anyhow::Result<DirEntry>;
    async fn unmount(&self);
}

/// The editor hosting the windows.
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Focuses the existing window titled `title`. Returns false if there is none.
    async fn show(&self, title: &str) -> anyhow::Result<bool>;
    async fn create_window(&self) -> anyhow::Result<Arc<dyn EditorWindow>>;
}

/// One editor window as seen by this client.
#[async_trait]
pub trait EditorWindow: Send + Sync {
    fn id(&self) -> WindowId;
    /// Names the window; error reports are prefixed with the title.
    async fn set_title(&self, title: &str) -> anyhow::Result<()>;
    async fn clear_tag(&self) -> anyhow::Result<()>;
    async fn append_tag(&self, text: &str) -> anyhow::Result<()>;
    async fn clear_body(&self) -> anyhow::Result<()>;
    async fn append_body(&self, data: &[u8]) -> anyhow::Result<()>;
    async fn read_body(&self) -> anyhow::Result<String>;
    async fn selection(&self) -> anyhow::Result<String>;
    /// Marks the body unmodified so closing the window does not warn.
    async fn mark_clean(&self) -> anyhow::Result<()>;
    /// Moves the cursor to the start of the body.
    async fn select_start(&self) -> anyhow::Result<()>;
    async fn show(&self) -> anyhow::Result<()>;
    async fn report_error(&self, message: &str) -> anyhow::Result<()>;
    async fn delete(&self) -> anyhow::Result<()>;
    /// Feeds user events to `handler` until the window is closed. Events the
    /// handler leaves unhandled get the editor's default behaviour.
    async fn run_events(&self, handler: &dyn EventHandler) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Handled,
    Unhandled,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    /// The user pointed at `text` (acme's button-3 look).
    async fn look(&self, text: &str) -> EventOutcome;
    /// The user executed `command` from the tag or body.
    async fn execute(&self, command: &str) -> EventOutcome;
}

#[cfg(test)]
#[path = "tests/fakes.rs"]
pub(crate) mod fakes;
