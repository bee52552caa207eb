use std::sync::Arc;

use acme::{Acme, AcmeError, Event, Win};
use anyhow::{Context, Result};
use async_trait::async_trait;
use client_core::{EditorHost, EditorWindow, EventHandler, EventOutcome};
use shared::domain::WindowId;
use ninep::NinepError;
use tracing::{trace, warn};

/// acme as the window host.
pub struct AcmeHost {
    acme: Acme,
}

impl AcmeHost {
    pub fn new(acme: Acme) -> Self {
        Self { acme }
    }
}

#[async_trait]
impl EditorHost for AcmeHost {
    async fn show(&self, title: &str) -> Result<bool> {
        self.acme
            .show(title)
            .await
            .with_context(|| format!("looking up window {title}"))
    }

    async fn create_window(&self) -> Result<Arc<dyn EditorWindow>> {
        let win = self.acme.new_window().await.context("creating acme window")?;
        Ok(Arc::new(AcmeWindow { win }))
    }
}

pub struct AcmeWindow {
    win: Win,
}

impl AcmeWindow {
    /// Text the event refers to. acme leaves long selections out of the
    /// event and they have to be read back from the body.
    async fn event_text(&self, event: &Event) -> Result<String> {
        if event.text.is_empty() && event.q0 < event.q1 {
            return Ok(self.win.read_range(event.q0, event.q1).await?);
        }
        Ok(event.text.clone())
    }
}

#[async_trait]
impl EditorWindow for AcmeWindow {
    fn id(&self) -> WindowId {
        WindowId(self.win.id())
    }

    async fn set_title(&self, title: &str) -> Result<()> {
        self.win.set_name(title).await?;
        self.win.set_error_prefix(title).await;
        Ok(())
    }

    async fn clear_tag(&self) -> Result<()> {
        Ok(self.win.ctl("cleartag").await?)
    }

    async fn append_tag(&self, text: &str) -> Result<()> {
        Ok(self.win.write("tag", text.as_bytes()).await?)
    }

    async fn clear_body(&self) -> Result<()> {
        Ok(self.win.clear().await?)
    }

    async fn append_body(&self, data: &[u8]) -> Result<()> {
        Ok(self.win.write("body", data).await?)
    }

    async fn read_body(&self) -> Result<String> {
        let body = self.win.read_all("body").await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn selection(&self) -> Result<String> {
        Ok(self.win.selection().await?)
    }

    async fn mark_clean(&self) -> Result<()> {
        Ok(self.win.ctl("clean").await?)
    }

    async fn select_start(&self) -> Result<()> {
        self.win.set_addr("#0").await?;
        Ok(self.win.ctl("dot=addr").await?)
    }

    async fn show(&self) -> Result<()> {
        Ok(self.win.ctl("show").await?)
    }

    async fn report_error(&self, message: &str) -> Result<()> {
        Ok(self.win.errf(message).await?)
    }

    async fn delete(&self) -> Result<()> {
        Ok(self.win.del(true).await?)
    }

    async fn run_events(&self, handler: &dyn EventHandler) -> Result<()> {
        let mut events = self.win.events().await?;
        loop {
            let event = match events.next().await {
                Ok(event) => event,
                // The window was closed, or acme exited and took it along.
                Err(AcmeError::EventsClosed) | Err(AcmeError::Fs(NinepError::Disconnected)) => {
                    return Ok(())
                }
                Err(AcmeError::BadEvent(reason)) => {
                    warn!(window = self.win.id(), %reason, "skipping malformed event");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            trace!(window = self.win.id(), ?event, "event");
            if !event.is_execute() && !event.is_look() {
                continue;
            }
            let outcome = match self.event_text(&event).await {
                Ok(text) if event.is_execute() => handler.execute(text.trim()).await,
                Ok(text) => handler.look(text.trim()).await,
                Err(err) => {
                    warn!(window = self.win.id(), error = %err, "reading event text failed");
                    EventOutcome::Unhandled
                }
            };
            if outcome == EventOutcome::Unhandled {
                if let Err(err) = events.write_back(&event).await {
                    warn!(window = self.win.id(), error = %err, "returning event to acme failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use acme::testing::FakeAcme;

    use super::*;

    /// Handles `Get` and looks at `alice`; everything else goes back to acme.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().expect("recorder lock").clone()
        }
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn look(&self, text: &str) -> EventOutcome {
            self.seen.lock().expect("recorder lock").push(format!("look {text}"));
            if text == "alice" {
                EventOutcome::Handled
            } else {
                EventOutcome::Unhandled
            }
        }

        async fn execute(&self, command: &str) -> EventOutcome {
            self.seen
                .lock()
                .expect("recorder lock")
                .push(format!("execute {command}"));
            if command == "Get" {
                EventOutcome::Handled
            } else {
                EventOutcome::Unhandled
            }
        }
    }

    async fn window() -> (Arc<dyn EditorWindow>, FakeAcme) {
        let (acme, fake) = FakeAcme::start().await;
        let window = AcmeHost::new(acme)
            .create_window()
            .await
            .expect("create window");
        (window, fake)
    }

    #[tokio::test]
    async fn unhandled_events_go_back_to_acme() {
        let (window, fake) = window().await;
        fake.push_event(1, "Mx0 4 0 4 Get \n");
        fake.push_event(1, "Mx5 8 0 3 Del\n");
        fake.push_event(1, "MI0 5 0 5 hello\n");
        fake.push_event(1, "Ml10 15 0 5 alice\nMl20 23 0 3 bob\n");

        let handler = Recorder::default();
        window.run_events(&handler).await.expect("loop ends on close");
        assert_eq!(
            handler.seen(),
            ["execute Get", "execute Del", "look alice", "look bob"]
        );
        assert_eq!(fake.writes_to("1/event"), ["Mx5 8 \n", "Ml20 23 \n"]);
    }

    #[tokio::test]
    async fn elided_text_is_read_from_the_body() {
        let (window, fake) = window().await;
        fake.set_file("1/xdata", "Get");
        fake.push_event(1, "Mx0 300 0 0 \n");

        let handler = Recorder::default();
        window.run_events(&handler).await.expect("loop");
        assert_eq!(handler.seen(), ["execute Get"]);
        assert_eq!(fake.writes_to("1/addr"), ["#0,#300"]);
        assert!(fake.writes_to("1/event").is_empty());
    }

    #[tokio::test]
    async fn event_failures_do_not_end_the_loop() {
        let (window, fake) = window().await;
        fake.fail_reads_of("1/xdata");
        fake.push_event(1, "Mx0 300 0 0 \n");
        fake.push_event(1, "Mx1x 2 0 0 \n");
        fake.push_event(1, "Mx0 3 0 3 Get\n");

        let handler = Recorder::default();
        window.run_events(&handler).await.expect("loop");
        assert_eq!(handler.seen(), ["execute Get"]);
        assert_eq!(fake.writes_to("1/event"), ["Mx0 300 \n"]);
    }

    #[tokio::test]
    async fn window_updates_reach_acme_files() {
        let (window, fake) = window().await;
        window.set_title("/twitter/home").await.expect("title");
        window.select_start().await.expect("select start");
        window.mark_clean().await.expect("clean");
        window.report_error("ctl: permission denied").await.expect("report");
        assert_eq!(
            fake.writes_to("1/ctl"),
            ["name /twitter/home\n", "dot=addr\n", "clean\n"]
        );
        assert_eq!(fake.writes_to("1/addr"), ["#0"]);
        assert_eq!(
            fake.writes_to("1/errors"),
            ["/twitter/home: ctl: permission denied\n"]
        );
    }

    #[tokio::test]
    async fn host_show_finds_titled_window() {
        let (acme, fake) = FakeAcme::start().await;
        fake.add_index_entry(2, "/twitter/mentions");
        let host = AcmeHost::new(acme);
        assert!(host.show("/twitter/mentions").await.expect("show"));
        assert!(!host.show("/twitter/home").await.expect("show"));
        assert_eq!(fake.writes_to("2/ctl"), ["show\n"]);
    }
}
