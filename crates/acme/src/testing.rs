//! An in-process stand-in for acme's file server.
//!
//! [`FakeAcme::start`] serves a scripted tree over an in-memory pipe and
//! returns an [`Acme`] mounted on it. Every write is recorded by path; reads
//! come from files set up with [`FakeAcme::set_file`], and each read of a
//! window's `event` file returns the next queued chunk, or nothing once the
//! queue is empty, which acme reports when a window is closed.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use ninep::{
    fcall::{Rmessage, Tmessage, VERSION},
    Client, Qid, DEFAULT_MSIZE,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use crate::Acme;

#[derive(Default)]
struct State {
    windows: u32,
    files: HashMap<String, Vec<u8>>,
    events: HashMap<u32, VecDeque<Vec<u8>>>,
    failing_reads: HashSet<String>,
    writes: Vec<(String, Vec<u8>)>,
}

#[derive(Clone, Default)]
pub struct FakeAcme {
    state: Arc<Mutex<State>>,
}

impl FakeAcme {
    pub async fn start() -> (Acme, FakeAcme) {
        let fake = FakeAcme::default();
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        tokio::spawn(fake.clone().serve(server_end));
        let fs = Client::mount(client_end, "glenda", DEFAULT_MSIZE)
            .await
            .expect("mount fake acme");
        (Acme { fs }, fake)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state.lock().expect("fake acme lock"))
    }

    /// Sets the contents of `path`, e.g. `index` or `3/xdata`.
    pub fn set_file(&self, path: &str, data: &str) {
        self.with_state(|s| s.files.insert(path.to_string(), data.as_bytes().to_vec()));
    }

    /// Adds a line for window `id` named `name` to the `index` file.
    pub fn add_index_entry(&self, id: u32, name: &str) {
        let line = format!(
            "{id:>11} {:>11} {:>11} {:>11} {:>11} {name} Del Snarf | Look\n",
            name.len() + 22,
            0,
            0,
            0
        );
        self.with_state(|s| {
            s.files
                .entry("index".to_string())
                .or_default()
                .extend_from_slice(line.as_bytes())
        });
    }

    /// Queues `raw` as the result of one read of window `id`'s event file.
    pub fn push_event(&self, id: u32, raw: &str) {
        self.with_state(|s| {
            s.events
                .entry(id)
                .or_default()
                .push_back(raw.as_bytes().to_vec())
        });
    }

    pub fn fail_reads_of(&self, path: &str) {
        self.with_state(|s| s.failing_reads.insert(path.to_string()));
    }

    /// Every write to `path`, in order.
    pub fn writes_to(&self, path: &str) -> Vec<String> {
        self.with_state(|s| {
            s.writes
                .iter()
                .filter(|(written, _)| written == path)
                .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
                .collect()
        })
    }

    /// Every write as `(path, text)`, in order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.with_state(|s| {
            s.writes
                .iter()
                .map(|(path, data)| (path.clone(), String::from_utf8_lossy(data).into_owned()))
                .collect()
        })
    }

    async fn serve(self, mut stream: DuplexStream) {
        let mut fids: HashMap<u32, String> = HashMap::new();
        loop {
            let Some(frame) = read_frame(&mut stream).await else {
                return;
            };
            let Ok((tag, request)) = Tmessage::decode(&frame) else {
                return;
            };
            let reply = self.answer(&mut fids, request);
            if stream.write_all(&reply.encode(tag)).await.is_err() {
                return;
            }
        }
    }

    fn answer(&self, fids: &mut HashMap<u32, String>, request: Tmessage) -> Rmessage {
        match request {
            Tmessage::Version { .. } => Rmessage::Version {
                msize: DEFAULT_MSIZE,
                version: VERSION.to_string(),
            },
            Tmessage::Attach { fid, .. } => {
                fids.insert(fid, String::new());
                Rmessage::Attach { qid: Qid::default() }
            }
            Tmessage::Walk { fid, newfid, names } => {
                let base = fids.get(&fid).cloned().unwrap_or_default();
                let path = names.iter().fold(base, |path, name| {
                    if path.is_empty() {
                        name.clone()
                    } else {
                        format!("{path}/{name}")
                    }
                });
                fids.insert(newfid, path);
                Rmessage::Walk {
                    qids: vec![Qid::default(); names.len()],
                }
            }
            Tmessage::Open { fid, .. } => {
                // Opening new/ctl creates a window and hands back its ctl file.
                if fids.get(&fid).is_some_and(|path| path == "new/ctl") {
                    let id = self.with_state(|s| {
                        s.windows += 1;
                        s.windows
                    });
                    fids.insert(fid, format!("{id}/ctl"));
                }
                Rmessage::Open {
                    qid: Qid::default(),
                    iounit: 0,
                }
            }
            Tmessage::Read { fid, offset, .. } => {
                let path = fids.get(&fid).cloned().unwrap_or_default();
                self.read(&path, offset)
            }
            Tmessage::Write { fid, data, .. } => {
                let path = fids.get(&fid).cloned().unwrap_or_default();
                let count = data.len() as u32;
                self.with_state(|s| s.writes.push((path, data)));
                Rmessage::Write { count }
            }
            Tmessage::Clunk { fid } => {
                fids.remove(&fid);
                Rmessage::Clunk
            }
            Tmessage::Stat { .. } => Rmessage::Error {
                ename: "permission denied".to_string(),
            },
        }
    }

    fn read(&self, path: &str, offset: u64) -> Rmessage {
        self.with_state(|s| {
            if s.failing_reads.contains(path) {
                return Rmessage::Error {
                    ename: format!("{path}: i/o error"),
                };
            }
            let (id, file) = path.split_once('/').unwrap_or(("", path));
            let data = match (id.parse::<u32>(), file) {
                (Ok(id), "event") => s
                    .events
                    .get_mut(&id)
                    .and_then(VecDeque::pop_front)
                    .unwrap_or_default(),
                (Ok(id), "ctl") => {
                    let line = format!("{id:>11} {:>11} {:>11} {:>11} {:>11} ", 0, 0, 0, 0);
                    tail(line.as_bytes(), offset)
                }
                _ => tail(s.files.get(path).map_or(&[][..], Vec::as_slice), offset),
            };
            Rmessage::Read { data }
        })
    }
}

fn tail(data: &[u8], offset: u64) -> Vec<u8> {
    let start = usize::try_from(offset).map_or(data.len(), |o| o.min(data.len()));
    data[start..].to_vec()
}

async fn read_frame(stream: &mut DuplexStream) -> Option<Vec<u8>> {
    let mut size = [0u8; 4];
    stream.read_exact(&mut size).await.ok()?;
    let len = u32::from_le_bytes(size) as usize;
    let mut frame = vec![0u8; len.max(4)];
    frame[..4].copy_from_slice(&size);
    stream.read_exact(&mut frame[4..]).await.ok()?;
    Some(frame)
}
