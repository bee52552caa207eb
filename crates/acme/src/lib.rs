//! Client for the acme editor's 9P file server.

use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
};

use ninep::{Client, File, Network, NinepError, OpenMode, DEFAULT_MSIZE};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

mod event;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use event::{Event, EventReader};

#[derive(Debug, Error)]
pub enum AcmeError {
    #[error("cannot locate the plan 9 namespace directory; set NAMESPACE")]
    NoNamespace,
    #[error("malformed ctl line {0:?}")]
    BadCtl(String),
    #[error("malformed event: {0}")]
    BadEvent(String),
    #[error("event file closed")]
    EventsClosed,
    #[error(transparent)]
    Fs(#[from] NinepError),
}

/// Directory holding the user's plan 9 service sockets: `$NAMESPACE`, or
/// `/tmp/ns.$USER.$DISPLAY`.
pub fn namespace() -> Option<PathBuf> {
    if let Some(ns) = env::var_os("NAMESPACE").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(ns));
    }
    let user = env::var("USER").ok().filter(|v| !v.is_empty())?;
    let display = canonical_display(env::var("DISPLAY").ok().as_deref());
    Some(PathBuf::from(format!("/tmp/ns.{user}.{display}")))
}

fn canonical_display(display: Option<&str>) -> String {
    let display = display.filter(|d| !d.is_empty()).unwrap_or(":0");
    let display = display.strip_suffix(".0").unwrap_or(display);
    display.replace('/', "_")
}

/// Finds the id of the window whose tag starts with `name` in the contents
/// of acme's `index` file.
pub fn find_in_index(index: &str, name: &str) -> Option<u32> {
    index.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let id = fields.next()?.parse().ok()?;
        let tag_name = fields.nth(4)?;
        (tag_name == name).then_some(id)
    })
}

/// A mounted acme instance.
#[derive(Clone, Debug)]
pub struct Acme {
    fs: Client,
}

impl Acme {
    pub async fn connect(namespace: &Path, uname: &str) -> Result<Self, AcmeError> {
        let socket = namespace.join("acme");
        let fs = Client::dial(
            Network::Unix,
            &socket.to_string_lossy(),
            uname,
            DEFAULT_MSIZE,
        )
        .await?;
        Ok(Self { fs })
    }

    pub async fn new_window(&self) -> Result<Win, AcmeError> {
        let mut ctl = self.fs.open("new/ctl", OpenMode::ReadWrite).await?;
        let line = ctl.read_chunk(5 * 12).await?;
        let line = String::from_utf8_lossy(&line).into_owned();
        let id = line
            .split_whitespace()
            .next()
            .and_then(|field| field.parse().ok())
            .ok_or_else(|| AcmeError::BadCtl(line.clone()))?;
        debug!(window = id, "created acme window");
        Ok(Win {
            fs: self.fs.clone(),
            id,
            ctl: Mutex::new(ctl),
            files: Mutex::new(HashMap::new()),
            error_prefix: Mutex::new(String::new()),
        })
    }

    /// Brings the window named `name` to the front. Returns false when no
    /// such window exists.
    pub async fn show(&self, name: &str) -> Result<bool, AcmeError> {
        let mut index = self.fs.open("index", OpenMode::Read).await?;
        let contents = index.read_to_end().await?;
        index.close().await?;
        let Some(id) = find_in_index(&String::from_utf8_lossy(&contents), name) else {
            return Ok(false);
        };
        let mut ctl = self.fs.open(&format!("{id}/ctl"), OpenMode::Write).await?;
        ctl.write_all(b"show\n").await?;
        ctl.close().await?;
        Ok(true)
    }
}

/// One acme window.
///
/// Files written through [`Win::write`] stay open for the life of the window
/// so state such as the `addr` range survives between writes.
pub struct Win {
    fs: Client,
    id: u32,
    ctl: Mutex<File>,
    files: Mutex<HashMap<&'static str, File>>,
    error_prefix: Mutex<String>,
}

impl std::fmt::Debug for Win {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Win").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Win {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub async fn ctl(&self, command: &str) -> Result<(), AcmeError> {
        let mut ctl = self.ctl.lock().await;
        ctl.write_all(format!("{command}\n").as_bytes()).await?;
        Ok(())
    }

    pub async fn write(&self, file: &'static str, data: &[u8]) -> Result<(), AcmeError> {
        let mut files = self.files.lock().await;
        if !files.contains_key(file) {
            let opened = self
                .fs
                .open(&format!("{}/{file}", self.id), OpenMode::Write)
                .await?;
            files.insert(file, opened);
        }
        if let Some(open) = files.get_mut(file) {
            open.write_all(data).await?;
        }
        Ok(())
    }

    pub async fn read_all(&self, file: &str) -> Result<Vec<u8>, AcmeError> {
        let mut open = self
            .fs
            .open(&format!("{}/{file}", self.id), OpenMode::Read)
            .await?;
        let data = open.read_to_end().await?;
        open.close().await?;
        Ok(data)
    }

    pub async fn set_addr(&self, addr: &str) -> Result<(), AcmeError> {
        self.write("addr", addr.as_bytes()).await
    }

    /// Deletes the whole body.
    pub async fn clear(&self) -> Result<(), AcmeError> {
        self.set_addr(",").await?;
        self.write("data", b"").await
    }

    /// Text currently selected in the body.
    pub async fn selection(&self) -> Result<String, AcmeError> {
        self.ctl("addr=dot").await?;
        let data = self.read_all("xdata").await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Body text between rune offsets `q0` and `q1`.
    pub async fn read_range(&self, q0: u32, q1: u32) -> Result<String, AcmeError> {
        self.set_addr(&format!("#{q0},#{q1}")).await?;
        let data = self.read_all("xdata").await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    pub async fn set_name(&self, name: &str) -> Result<(), AcmeError> {
        self.ctl(&format!("name {name}")).await
    }

    pub async fn set_error_prefix(&self, prefix: &str) {
        *self.error_prefix.lock().await = prefix.to_string();
    }

    /// Writes a message to the window's `errors` file, which acme shows in
    /// an `+Errors` window.
    pub async fn errf(&self, message: &str) -> Result<(), AcmeError> {
        let prefix = self.error_prefix.lock().await.clone();
        let mut line = if prefix.is_empty() {
            message.to_string()
        } else {
            format!("{prefix}: {message}")
        };
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.write("errors", line.as_bytes()).await
    }

    /// Deletes the window; `sure` skips acme's unsaved-changes check.
    pub async fn del(&self, sure: bool) -> Result<(), AcmeError> {
        self.ctl(if sure { "delete" } else { "del" }).await
    }

    pub async fn events(&self) -> Result<EventReader, AcmeError> {
        let file = self
            .fs
            .open(&format!("{}/event", self.id), OpenMode::ReadWrite)
            .await?;
        Ok(EventReader::new(file))
    }
}

#[cfg(test)]
#[path = "tests/win_tests.rs"]
mod win_tests;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_canonicalized() {
        assert_eq!(canonical_display(None), ":0");
        assert_eq!(canonical_display(Some(":1.0")), ":1");
        assert_eq!(canonical_display(Some(":1.1")), ":1.1");
        assert_eq!(
            canonical_display(Some("/private/tmp/launch/org.xquartz:0")),
            "_private_tmp_launch_org.xquartz:0"
        );
    }

    #[test]
    fn index_lookup_matches_first_tag_word() {
        let index = concat!(
            "          1          40           0           1           0 /home/glenda/ Del Snarf Get | Look \n",
            "          7          52        1200           0           0 /twitter/home Del Snarf | New Reply Newer Older Trim Get \n",
            "          9          33           0           0           1 /twitter/homework Del Snarf | Look \n",
        );
        assert_eq!(find_in_index(index, "/twitter/home"), Some(7));
        assert_eq!(find_in_index(index, "/twitter/homework"), Some(9));
        assert_eq!(find_in_index(index, "/twitter/mentions"), None);
    }
}
