//! Minimal 9P2000 client.
//!
//! A [`Client`] is cheap to clone and safe to share between tasks: requests
//! are tagged, written under a single writer lock, and a background reader
//! routes each reply to the task waiting on its tag.

use std::{
    collections::HashMap,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering},
        Arc,
    },
};

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
    sync::{oneshot, Mutex},
};
use tracing::{debug, warn};

pub mod fcall;

pub use fcall::{OpenMode, Qid, Stat};
use fcall::{Rmessage, Tmessage, IOHDRSZ, MAXWELEM, NOFID, NOTAG, VERSION};

pub const DEFAULT_MSIZE: u32 = 8192;

const ROOT_FID: u32 = 0;

#[derive(Debug, Error)]
pub enum NinepError {
    #[error("unsupported network {0:?}; expected tcp or unix")]
    UnsupportedNetwork(String),
    #[error("server speaks {0:?}, not 9P2000")]
    VersionMismatch(String),
    #[error("path {0:?} has more than 16 elements")]
    PathTooDeep(String),
    #[error("{0}: file does not exist")]
    NotFound(String),
    #[error("frame exceeded msize ({max_bytes} bytes)")]
    FrameTooLarge { max_bytes: usize },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },
    #[error("{0}")]
    Remote(String),
    #[error("every 9P tag is waiting on a reply")]
    TagsExhausted,
    #[error("9P connection closed")]
    Disconnected,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Unix,
}

impl FromStr for Network {
    type Err = NinepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "unix" => Ok(Self::Unix),
            _ => Err(NinepError::UnsupportedNetwork(s.to_string())),
        }
    }
}

type Reply = Result<Rmessage, NinepError>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Shared {
    writer: Mutex<BoxedWriter>,
    pending: Mutex<HashMap<u16, oneshot::Sender<Reply>>>,
    next_tag: AtomicU16,
    next_fid: AtomicU32,
    msize: AtomicU32,
    closed: AtomicBool,
}

/// A mounted 9P file tree.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("msize", &self.msize())
            .field("closed", &self.shared.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Connects to `address` over `network` and mounts the served tree as `uname`.
    pub async fn dial(
        network: Network,
        address: &str,
        uname: &str,
        msize: u32,
    ) -> Result<Self, NinepError> {
        match network {
            Network::Tcp => {
                let stream = TcpStream::connect(address).await?;
                stream.set_nodelay(true)?;
                Self::mount(stream, uname, msize).await
            }
            #[cfg(unix)]
            Network::Unix => {
                let stream = tokio::net::UnixStream::connect(address).await?;
                Self::mount(stream, uname, msize).await
            }
            #[cfg(not(unix))]
            Network::Unix => Err(NinepError::UnsupportedNetwork("unix".to_string())),
        }
    }

    /// Negotiates the protocol version over an established stream and
    /// attaches to the root of the served tree.
    pub async fn mount<S>(stream: S, uname: &str, msize: u32) -> Result<Self, NinepError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer): (ReadHalf<S>, WriteHalf<S>) = tokio::io::split(stream);
        let shared = Arc::new(Shared {
            writer: Mutex::new(Box::new(writer)),
            pending: Mutex::new(HashMap::new()),
            next_tag: AtomicU16::new(0),
            next_fid: AtomicU32::new(ROOT_FID + 1),
            msize: AtomicU32::new(msize),
            closed: AtomicBool::new(false),
        });
        tokio::spawn(read_loop(Arc::clone(&shared), reader));
        let client = Self { shared };

        let reply = client
            .transact(
                Some(NOTAG),
                Tmessage::Version {
                    msize,
                    version: VERSION.to_string(),
                },
            )
            .await?;
        match reply {
            Rmessage::Version {
                msize: agreed,
                version,
            } => {
                if version != VERSION {
                    return Err(NinepError::VersionMismatch(version));
                }
                client
                    .shared
                    .msize
                    .store(agreed.min(msize), Ordering::SeqCst);
            }
            other => return Err(unexpected("Rversion", &other)),
        }

        let reply = client
            .rpc(Tmessage::Attach {
                fid: ROOT_FID,
                afid: NOFID,
                uname: uname.to_string(),
                aname: String::new(),
            })
            .await?;
        match reply {
            Rmessage::Attach { .. } => {}
            other => return Err(unexpected("Rattach", &other)),
        }
        debug!(uname, msize = client.msize(), "mounted 9P tree");
        Ok(client)
    }

    pub fn msize(&self) -> u32 {
        self.shared.msize.load(Ordering::SeqCst)
    }

    /// Walks to `path` (relative to the root) and opens it.
    pub async fn open(&self, path: &str, mode: OpenMode) -> Result<File, NinepError> {
        let fid = self.walk(path).await?;
        match self.rpc(Tmessage::Open { fid, mode }).await {
            Ok(Rmessage::Open { qid, iounit }) => {
                let iounit = if iounit == 0 {
                    self.msize().saturating_sub(IOHDRSZ)
                } else {
                    iounit.min(self.msize().saturating_sub(IOHDRSZ))
                };
                Ok(File {
                    client: self.clone(),
                    fid,
                    qid,
                    iounit: iounit.max(1),
                    offset: 0,
                    clunked: false,
                })
            }
            Ok(other) => {
                let _ = self.clunk(fid).await;
                Err(unexpected("Ropen", &other))
            }
            Err(err) => {
                let _ = self.clunk(fid).await;
                Err(err)
            }
        }
    }

    pub async fn stat(&self, path: &str) -> Result<Stat, NinepError> {
        let fid = self.walk(path).await?;
        let reply = self.rpc(Tmessage::Stat { fid }).await;
        let _ = self.clunk(fid).await;
        match reply? {
            Rmessage::Stat { stat } => Ok(stat),
            other => Err(unexpected("Rstat", &other)),
        }
    }

    /// Releases the root fid and closes the connection. Later requests fail
    /// with [`NinepError::Disconnected`].
    pub async fn unmount(&self) {
        if self.shared.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.clunk(ROOT_FID).await {
            debug!(error = %err, "clunking root fid failed");
        }
        self.shared.closed.store(true, Ordering::SeqCst);
        let mut writer = self.shared.writer.lock().await;
        if let Err(err) = writer.shutdown().await {
            debug!(error = %err, "shutting down 9P connection failed");
        }
    }

    async fn walk(&self, path: &str) -> Result<u32, NinepError> {
        let names: Vec<String> = path
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .map(str::to_string)
            .collect();
        if names.len() > MAXWELEM {
            return Err(NinepError::PathTooDeep(path.to_string()));
        }
        let wanted = names.len();
        let newfid = self.shared.next_fid.fetch_add(1, Ordering::Relaxed);
        let reply = self
            .rpc(Tmessage::Walk {
                fid: ROOT_FID,
                newfid,
                names,
            })
            .await?;
        match reply {
            // A short walk leaves newfid unassigned.
            Rmessage::Walk { qids } if qids.len() == wanted => Ok(newfid),
            Rmessage::Walk { .. } => Err(NinepError::NotFound(path.to_string())),
            other => Err(unexpected("Rwalk", &other)),
        }
    }

    async fn clunk(&self, fid: u32) -> Result<(), NinepError> {
        match self.rpc(Tmessage::Clunk { fid }).await? {
            Rmessage::Clunk => Ok(()),
            other => Err(unexpected("Rclunk", &other)),
        }
    }

    async fn rpc(&self, msg: Tmessage) -> Result<Rmessage, NinepError> {
        self.transact(None, msg).await
    }

    async fn transact(&self, tag: Option<u16>, msg: Tmessage) -> Result<Rmessage, NinepError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(NinepError::Disconnected);
        }

        let (tx, rx) = oneshot::channel();
        let tag = {
            let mut pending = self.shared.pending.lock().await;
            let tag = match tag {
                Some(tag) => tag,
                None => self.free_tag(&pending)?,
            };
            pending.insert(tag, tx);
            tag
        };
        // The reader marks the connection closed before draining `pending`.
        if self.shared.closed.load(Ordering::SeqCst) {
            self.shared.pending.lock().await.remove(&tag);
            return Err(NinepError::Disconnected);
        }

        let frame = msg.encode(tag);
        let max_bytes = self.msize() as usize;
        if frame.len() > max_bytes {
            self.shared.pending.lock().await.remove(&tag);
            return Err(NinepError::FrameTooLarge { max_bytes });
        }

        let written = {
            let mut writer = self.shared.writer.lock().await;
            match writer.write_all(&frame).await {
                Ok(()) => writer.flush().await,
                Err(err) => Err(err),
            }
        };
        if let Err(err) = written {
            self.shared.pending.lock().await.remove(&tag);
            return Err(err.into());
        }

        match rx.await.map_err(|_| NinepError::Disconnected)?? {
            Rmessage::Error { ename } => Err(NinepError::Remote(ename)),
            reply => Ok(reply),
        }
    }

    // One pass over the tag space; NOTAG is never handed out.
    fn free_tag(&self, pending: &HashMap<u16, oneshot::Sender<Reply>>) -> Result<u16, NinepError> {
        for _ in 0..=u16::MAX {
            let candidate = self.shared.next_tag.fetch_add(1, Ordering::Relaxed);
            if candidate != NOTAG && !pending.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(NinepError::TagsExhausted)
    }
}

async fn read_loop<R>(shared: Arc<Shared>, mut reader: R)
where
    R: AsyncRead + Unpin,
{
    let err = loop {
        let frame = match read_frame(&mut reader, shared.msize.load(Ordering::SeqCst)).await {
            Ok(frame) => frame,
            Err(err) => break err,
        };
        let (tag, reply) = match Rmessage::decode(&frame) {
            Ok(decoded) => decoded,
            Err(err) => break err,
        };
        match shared.pending.lock().await.remove(&tag) {
            Some(tx) => {
                let _ = tx.send(Ok(reply));
            }
            None => warn!(tag, reply = reply.name(), "9P reply for unknown tag"),
        }
    };

    debug!(error = %err, "9P reader stopped");
    shared.closed.store(true, Ordering::SeqCst);
    for (_, tx) in shared.pending.lock().await.drain() {
        let _ = tx.send(Err(NinepError::Disconnected));
    }
}

async fn read_frame<R>(reader: &mut R, msize: u32) -> Result<Vec<u8>, NinepError>
where
    R: AsyncRead + Unpin,
{
    let mut size = [0u8; 4];
    match reader.read_exact(&mut size).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(NinepError::Disconnected)
        }
        Err(err) => return Err(err.into()),
    }
    let len = u32::from_le_bytes(size) as usize;
    if len > msize as usize {
        return Err(NinepError::FrameTooLarge {
            max_bytes: msize as usize,
        });
    }
    if len < 7 {
        return Err(NinepError::Protocol(format!("frame of {len} bytes is too short")));
    }
    let mut frame = vec![0u8; len];
    frame[..4].copy_from_slice(&size);
    reader.read_exact(&mut frame[4..]).await?;
    Ok(frame)
}

fn unexpected(expected: &'static str, got: &Rmessage) -> NinepError {
    NinepError::UnexpectedResponse {
        expected,
        got: got.name(),
    }
}

/// An open fid. Reads and writes advance a private offset.
///
/// Call [`File::close`] to clunk the fid; a dropped file is clunked in the
/// background when a runtime is available.
pub struct File {
    client: Client,
    fid: u32,
    qid: Qid,
    iounit: u32,
    offset: u64,
    clunked: bool,
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("fid", &self.fid)
            .field("qid", &self.qid)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl File {
    /// Issues one read of at most `limit` bytes (capped at the iounit).
    /// An empty result means end of file.
    pub async fn read_chunk(&mut self, limit: usize) -> Result<Vec<u8>, NinepError> {
        let count = limit.min(self.iounit as usize) as u32;
        let reply = self
            .client
            .rpc(Tmessage::Read {
                fid: self.fid,
                offset: self.offset,
                count,
            })
            .await?;
        match reply {
            Rmessage::Read { mut data } => {
                data.truncate(count as usize);
                self.offset += data.len() as u64;
                Ok(data)
            }
            other => Err(unexpected("Rread", &other)),
        }
    }

    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, NinepError> {
        let mut out = Vec::new();
        loop {
            let chunk = self.read_chunk(self.iounit as usize).await?;
            if chunk.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(&chunk);
        }
    }

    /// Reads every entry of an open directory. The zero-length read that
    /// marks the end of the directory is not an error.
    pub async fn read_dir(&mut self) -> Result<Vec<Stat>, NinepError> {
        let mut entries = Vec::new();
        loop {
            let chunk = self.read_chunk(self.iounit as usize).await?;
            if chunk.is_empty() {
                return Ok(entries);
            }
            entries.extend(fcall::decode_dir(&chunk)?);
        }
    }

    /// Writes `data`, splitting it at the iounit. An empty slice still sends
    /// one zero-length write.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), NinepError> {
        if data.is_empty() {
            self.write_once(data).await?;
            return Ok(());
        }
        let mut rest = data;
        while !rest.is_empty() {
            let chunk = &rest[..rest.len().min(self.iounit as usize)];
            let written = self.write_once(chunk).await?;
            if written == 0 {
                return Err(NinepError::Protocol("server accepted zero bytes".to_string()));
            }
            rest = &rest[written.min(rest.len())..];
        }
        Ok(())
    }

    async fn write_once(&mut self, data: &[u8]) -> Result<usize, NinepError> {
        let reply = self
            .client
            .rpc(Tmessage::Write {
                fid: self.fid,
                offset: self.offset,
                data: data.to_vec(),
            })
            .await?;
        match reply {
            Rmessage::Write { count } => {
                self.offset += u64::from(count);
                Ok(count as usize)
            }
            other => Err(unexpected("Rwrite", &other)),
        }
    }

    pub async fn close(mut self) -> Result<(), NinepError> {
        self.clunked = true;
        self.client.clunk(self.fid).await
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if self.clunked {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let client = self.client.clone();
            let fid = self.fid;
            handle.spawn(async move {
                let _ = client.clunk(fid).await;
            });
        }
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
