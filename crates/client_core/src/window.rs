//! Per-window state machine.
//!
//! A window's [`WindowMode`] is fixed at creation and decides which remote
//! directory it shows, which commands its tag offers and how it reacts to
//! them.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{is_entry_id, user_path, WindowId, WindowMode},
    protocol::{ControlCommand, Scope, TRIM_KEEP},
};
use tracing::{debug, error, info, warn};

use crate::{
    error::ClientError, session::Session, timeline, EditorWindow, EventHandler, EventOutcome,
};

pub struct Window {
    mode: WindowMode,
    handle: Arc<dyn EditorWindow>,
    session: Arc<Session>,
}

impl Window {
    pub(crate) fn new(mode: WindowMode, handle: Arc<dyn EditorWindow>, session: Arc<Session>) -> Self {
        Self {
            mode,
            handle,
            session,
        }
    }

    pub fn id(&self) -> WindowId {
        self.handle.id()
    }

    pub fn mode(&self) -> &WindowMode {
        &self.mode
    }

    pub fn title(&self) -> String {
        self.mode.title()
    }

    /// Replaces the tag with the fixed commands for this window's mode.
    pub async fn reset_tag(&self) {
        self.note(self.handle.clear_tag().await, "clear tag");
        self.note(self.handle.append_tag(self.mode.tag()).await, "write tag");
    }

    /// Reloads the body from the remote timeline. On failure the body shows
    /// the error and stays dirty. Compose windows have nothing to load.
    pub async fn refresh(&self) {
        let Some(path) = self.mode.timeline_path() else {
            return;
        };
        let mut rendered = Vec::new();
        let result = timeline::render(self.session.fsys(), &path, &mut rendered).await;

        self.note(self.handle.clear_body().await, "clear body");
        match result {
            Ok(()) => {
                self.note(self.handle.append_body(&rendered).await, "write body");
                self.note(self.handle.mark_clean().await, "mark clean");
            }
            Err(err) => {
                warn!(window = %self.id(), %path, error = %err, "timeline load failed");
                self.note(
                    self.handle.append_body(err.to_string().as_bytes()).await,
                    "write error",
                );
            }
        }
        self.note(self.handle.select_start().await, "select start");
        self.note(self.handle.show().await, "show");
    }

    /// Runs the event loop until the editor closes the window, then drops
    /// the window from the registry.
    ///
    /// A loop that fails is not a close; the window stays registered.
    pub(crate) async fn run(self: Arc<Self>) {
        match self.handle.run_events(self.as_ref()).await {
            Ok(()) => {
                self.session.registry().unregister(&self).await;
            }
            Err(err) => {
                error!(
                    window = %self.id(),
                    title = %self.title(),
                    error = %err,
                    "event loop failed; window left registered"
                );
            }
        }
    }

    async fn execute_timeline(&self, scope: Scope, command: &str) -> EventOutcome {
        match command {
            "Reply" => {
                let selection = self.handle.selection().await.unwrap_or_default();
                if is_entry_id(&selection) {
                    self.session.open(WindowMode::reply(selection)).await;
                }
                EventOutcome::Handled
            }
            "New" => {
                self.session.open(WindowMode::new_post()).await;
                EventOutcome::Handled
            }
            "Newer" => {
                self.page(ControlCommand::Newer { scope }).await;
                EventOutcome::Handled
            }
            "Older" => {
                self.page(ControlCommand::Older { scope }).await;
                EventOutcome::Handled
            }
            "Trim" => {
                self.page(ControlCommand::Trim {
                    scope,
                    keep: TRIM_KEEP,
                })
                .await;
                EventOutcome::Handled
            }
            "Get" => {
                self.refresh().await;
                EventOutcome::Handled
            }
            _ => EventOutcome::Unhandled,
        }
    }

    // The window is refreshed whether or not the command went through; a
    // failed command is only logged.
    async fn page(&self, command: ControlCommand) {
        if let Err(err) = self.session.dispatcher().send(&command).await {
            warn!(window = %self.id(), error = %err, "timeline command failed");
        }
        self.refresh().await;
    }

    async fn post(&self, in_reply_to: Option<&str>) -> EventOutcome {
        let text = match self.handle.read_body().await {
            Ok(text) => text,
            Err(source) => {
                let err = ClientError::Body { source };
                self.report(&err).await;
                return EventOutcome::Unhandled;
            }
        };
        let command = match in_reply_to {
            None => ControlCommand::Post { text },
            Some(id) => ControlCommand::Reply {
                in_reply_to: id.to_string(),
                text,
            },
        };
        if let Err(err) = self.session.dispatcher().send(&command).await {
            self.report(&err).await;
            return EventOutcome::Unhandled;
        }
        info!(window = %self.id(), command = command.verb(), "posted");
        self.note(self.handle.delete().await, "delete window");
        EventOutcome::Handled
    }

    async fn report(&self, err: &ClientError) {
        warn!(window = %self.id(), error = %err, "post failed");
        self.note(
            self.handle.report_error(&err.to_string()).await,
            "report error",
        );
    }

    fn note(&self, result: anyhow::Result<()>, action: &'static str) {
        if let Err(err) = result {
            debug!(window = %self.id(), action, error = %err, "editor update failed");
        }
    }
}

#[async_trait]
impl EventHandler for Window {
    async fn look(&self, text: &str) -> EventOutcome {
        // Entry ids are left to the editor until entries get windows of their own.
        if is_entry_id(text) {
            return EventOutcome::Unhandled;
        }
        let screen_name = text.to_lowercase();
        if screen_name.is_empty() || screen_name.contains('/') {
            return EventOutcome::Unhandled;
        }
        match self.session.fsys().stat(&user_path(&screen_name)).await {
            Ok(entry) if entry.is_dir => {
                self.session.open(WindowMode::user(screen_name)).await;
                EventOutcome::Handled
            }
            Ok(_) => EventOutcome::Unhandled,
            Err(err) => {
                debug!(%screen_name, error = %err, "no such user");
                EventOutcome::Unhandled
            }
        }
    }

    async fn execute(&self, command: &str) -> EventOutcome {
        match &self.mode {
            WindowMode::Compose { in_reply_to } => match command {
                "Post" => self.post(in_reply_to.as_deref()).await,
                _ => EventOutcome::Unhandled,
            },
            timeline_mode => match Scope::for_mode(timeline_mode) {
                Some(scope) => self.execute_timeline(scope, command).await,
                None => EventOutcome::Unhandled,
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/window_tests.rs"]
mod tests;
