//! 9P2000 message codec.
//!
//! Every message is framed as `size[4] type[1] tag[2] body`, little-endian,
//! with strings encoded as `len[2]` followed by UTF-8 bytes.

use crate::NinepError;

pub const VERSION: &str = "9P2000";
pub const NOTAG: u16 = 0xFFFF;
pub const NOFID: u32 = 0xFFFF_FFFF;
/// Space taken by the Tread/Twrite header within msize.
pub const IOHDRSZ: u32 = 24;
pub const MAXWELEM: usize = 16;
pub const DMDIR: u32 = 0x8000_0000;
pub const QTDIR: u8 = 0x80;

const HEADER_LEN: usize = 7;

const TVERSION: u8 = 100;
const RVERSION: u8 = 101;
const TATTACH: u8 = 104;
const RATTACH: u8 = 105;
const RERROR: u8 = 107;
const TWALK: u8 = 110;
const RWALK: u8 = 111;
const TOPEN: u8 = 112;
const ROPEN: u8 = 113;
const TREAD: u8 = 116;
const RREAD: u8 = 117;
const TWRITE: u8 = 118;
const RWRITE: u8 = 119;
const TCLUNK: u8 = 120;
const RCLUNK: u8 = 121;
const TSTAT: u8 = 124;
const RSTAT: u8 = 125;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    fn to_byte(self) -> u8 {
        match self {
            Self::Read => 0,
            Self::Write => 1,
            Self::ReadWrite => 2,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, NinepError> {
        match byte & 3 {
            0 => Ok(Self::Read),
            1 => Ok(Self::Write),
            2 => Ok(Self::ReadWrite),
            other => Err(NinepError::Protocol(format!("unsupported open mode {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Qid {
    pub kind: u8,
    pub version: u32,
    pub path: u64,
}

impl Qid {
    pub fn is_dir(&self) -> bool {
        self.kind & QTDIR != 0
    }
}

/// A machine-independent directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stat {
    pub kind: u16,
    pub dev: u32,
    pub qid: Qid,
    pub mode: u32,
    pub atime: u32,
    pub mtime: u32,
    pub length: u64,
    pub name: String,
    pub uid: String,
    pub gid: String,
    pub muid: String,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.mode & DMDIR != 0
    }

    /// Encodes the stat including its leading `size[2]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Encoder::default();
        body.u16(self.kind);
        body.u32(self.dev);
        body.qid(&self.qid);
        body.u32(self.mode);
        body.u32(self.atime);
        body.u32(self.mtime);
        body.u64(self.length);
        body.string(&self.name);
        body.string(&self.uid);
        body.string(&self.gid);
        body.string(&self.muid);

        let mut out = Encoder::default();
        out.u16(body.buf.len() as u16);
        out.buf.extend_from_slice(&body.buf);
        out.buf
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, NinepError> {
        let size = dec.u16()? as usize;
        let mut inner = Decoder::new(dec.take(size)?);
        Ok(Self {
            kind: inner.u16()?,
            dev: inner.u32()?,
            qid: inner.qid()?,
            mode: inner.u32()?,
            atime: inner.u32()?,
            mtime: inner.u32()?,
            length: inner.u64()?,
            name: inner.string()?,
            uid: inner.string()?,
            gid: inner.string()?,
            muid: inner.string()?,
        })
    }
}

/// Splits the payload of a directory read into its stat entries.
pub fn decode_dir(data: &[u8]) -> Result<Vec<Stat>, NinepError> {
    let mut dec = Decoder::new(data);
    let mut entries = Vec::new();
    while dec.remaining() > 0 {
        entries.push(Stat::decode(&mut dec)?);
    }
    Ok(entries)
}

/// Client-to-server requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tmessage {
    Version {
        msize: u32,
        version: String,
    },
    Attach {
        fid: u32,
        afid: u32,
        uname: String,
        aname: String,
    },
    Walk {
        fid: u32,
        newfid: u32,
        names: Vec<String>,
    },
    Open {
        fid: u32,
        mode: OpenMode,
    },
    Read {
        fid: u32,
        offset: u64,
        count: u32,
    },
    Write {
        fid: u32,
        offset: u64,
        data: Vec<u8>,
    },
    Clunk {
        fid: u32,
    },
    Stat {
        fid: u32,
    },
}

impl Tmessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Version { .. } => "Tversion",
            Self::Attach { .. } => "Tattach",
            Self::Walk { .. } => "Twalk",
            Self::Open { .. } => "Topen",
            Self::Read { .. } => "Tread",
            Self::Write { .. } => "Twrite",
            Self::Clunk { .. } => "Tclunk",
            Self::Stat { .. } => "Tstat",
        }
    }

    pub fn encode(&self, tag: u16) -> Vec<u8> {
        let mut enc = Encoder::default();
        match self {
            Self::Version { msize, version } => {
                enc.header(TVERSION, tag);
                enc.u32(*msize);
                enc.string(version);
            }
            Self::Attach {
                fid,
                afid,
                uname,
                aname,
            } => {
                enc.header(TATTACH, tag);
                enc.u32(*fid);
                enc.u32(*afid);
                enc.string(uname);
                enc.string(aname);
            }
            Self::Walk { fid, newfid, names } => {
                enc.header(TWALK, tag);
                enc.u32(*fid);
                enc.u32(*newfid);
                enc.u16(names.len() as u16);
                for name in names {
                    enc.string(name);
                }
            }
            Self::Open { fid, mode } => {
                enc.header(TOPEN, tag);
                enc.u32(*fid);
                enc.u8(mode.to_byte());
            }
            Self::Read { fid, offset, count } => {
                enc.header(TREAD, tag);
                enc.u32(*fid);
                enc.u64(*offset);
                enc.u32(*count);
            }
            Self::Write { fid, offset, data } => {
                enc.header(TWRITE, tag);
                enc.u32(*fid);
                enc.u64(*offset);
                enc.u32(data.len() as u32);
                enc.buf.extend_from_slice(data);
            }
            Self::Clunk { fid } => {
                enc.header(TCLUNK, tag);
                enc.u32(*fid);
            }
            Self::Stat { fid } => {
                enc.header(TSTAT, tag);
                enc.u32(*fid);
            }
        }
        enc.finish()
    }

    /// Decodes a complete frame, size prefix included.
    pub fn decode(frame: &[u8]) -> Result<(u16, Self), NinepError> {
        let (kind, tag, mut dec) = open_frame(frame)?;
        let msg = match kind {
            TVERSION => Self::Version {
                msize: dec.u32()?,
                version: dec.string()?,
            },
            TATTACH => Self::Attach {
                fid: dec.u32()?,
                afid: dec.u32()?,
                uname: dec.string()?,
                aname: dec.string()?,
            },
            TWALK => {
                let fid = dec.u32()?;
                let newfid = dec.u32()?;
                let count = dec.u16()? as usize;
                let names = (0..count)
                    .map(|_| dec.string())
                    .collect::<Result<Vec<_>, _>>()?;
                Self::Walk { fid, newfid, names }
            }
            TOPEN => Self::Open {
                fid: dec.u32()?,
                mode: OpenMode::from_byte(dec.u8()?)?,
            },
            TREAD => Self::Read {
                fid: dec.u32()?,
                offset: dec.u64()?,
                count: dec.u32()?,
            },
            TWRITE => {
                let fid = dec.u32()?;
                let offset = dec.u64()?;
                let count = dec.u32()? as usize;
                Self::Write {
                    fid,
                    offset,
                    data: dec.take(count)?.to_vec(),
                }
            }
            TCLUNK => Self::Clunk { fid: dec.u32()? },
            TSTAT => Self::Stat { fid: dec.u32()? },
            other => {
                return Err(NinepError::Protocol(format!(
                    "unsupported request type {other}"
                )))
            }
        };
        Ok((tag, msg))
    }
}

/// Server-to-client replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rmessage {
    Version { msize: u32, version: String },
    Attach { qid: Qid },
    Error { ename: String },
    Walk { qids: Vec<Qid> },
    Open { qid: Qid, iounit: u32 },
    Read { data: Vec<u8> },
    Write { count: u32 },
    Clunk,
    Stat { stat: Stat },
}

impl Rmessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Version { .. } => "Rversion",
            Self::Attach { .. } => "Rattach",
            Self::Error { .. } => "Rerror",
            Self::Walk { .. } => "Rwalk",
            Self::Open { .. } => "Ropen",
            Self::Read { .. } => "Rread",
            Self::Write { .. } => "Rwrite",
            Self::Clunk => "Rclunk",
            Self::Stat { .. } => "Rstat",
        }
    }

    pub fn encode(&self, tag: u16) -> Vec<u8> {
        let mut enc = Encoder::default();
        match self {
            Self::Version { msize, version } => {
                enc.header(RVERSION, tag);
                enc.u32(*msize);
                enc.string(version);
            }
            Self::Attach { qid } => {
                enc.header(RATTACH, tag);
                enc.qid(qid);
            }
            Self::Error { ename } => {
                enc.header(RERROR, tag);
                enc.string(ename);
            }
            Self::Walk { qids } => {
                enc.header(RWALK, tag);
                enc.u16(qids.len() as u16);
                for qid in qids {
                    enc.qid(qid);
                }
            }
            Self::Open { qid, iounit } => {
                enc.header(ROPEN, tag);
                enc.qid(qid);
                enc.u32(*iounit);
            }
            Self::Read { data } => {
                enc.header(RREAD, tag);
                enc.u32(data.len() as u32);
                enc.buf.extend_from_slice(data);
            }
            Self::Write { count } => {
                enc.header(RWRITE, tag);
                enc.u32(*count);
            }
            Self::Clunk => enc.header(RCLUNK, tag),
            Self::Stat { stat } => {
                enc.header(RSTAT, tag);
                let encoded = stat.encode();
                enc.u16(encoded.len() as u16);
                enc.buf.extend_from_slice(&encoded);
            }
        }
        enc.finish()
    }

    /// Decodes a complete frame, size prefix included.
    pub fn decode(frame: &[u8]) -> Result<(u16, Self), NinepError> {
        let (kind, tag, mut dec) = open_frame(frame)?;
        let msg = match kind {
            RVERSION => Self::Version {
                msize: dec.u32()?,
                version: dec.string()?,
            },
            RATTACH => Self::Attach { qid: dec.qid()? },
            RERROR => Self::Error {
                ename: dec.string()?,
            },
            RWALK => {
                let count = dec.u16()? as usize;
                let qids = (0..count)
                    .map(|_| dec.qid())
                    .collect::<Result<Vec<_>, _>>()?;
                Self::Walk { qids }
            }
            ROPEN => Self::Open {
                qid: dec.qid()?,
                iounit: dec.u32()?,
            },
            RREAD => {
                let count = dec.u32()? as usize;
                Self::Read {
                    data: dec.take(count)?.to_vec(),
                }
            }
            RWRITE => Self::Write { count: dec.u32()? },
            RCLUNK => Self::Clunk,
            RSTAT => {
                let len = dec.u16()? as usize;
                let mut inner = Decoder::new(dec.take(len)?);
                Self::Stat {
                    stat: Stat::decode(&mut inner)?,
                }
            }
            other => {
                return Err(NinepError::Protocol(format!(
                    "unsupported reply type {other}"
                )))
            }
        };
        Ok((tag, msg))
    }
}

fn open_frame(frame: &[u8]) -> Result<(u8, u16, Decoder<'_>), NinepError> {
    let mut dec = Decoder::new(frame);
    let size = dec.u32()? as usize;
    if size != frame.len() || size < HEADER_LEN {
        return Err(NinepError::Protocol(format!(
            "frame size {size} does not match {} received bytes",
            frame.len()
        )));
    }
    let kind = dec.u8()?;
    let tag = dec.u16()?;
    Ok((kind, tag, dec))
}

#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn header(&mut self, kind: u8, tag: u16) {
        self.u32(0);
        self.u8(kind);
        self.u16(tag);
    }

    fn finish(mut self) -> Vec<u8> {
        let size = (self.buf.len() as u32).to_le_bytes();
        self.buf[..4].copy_from_slice(&size);
        self.buf
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn string(&mut self, s: &str) {
        self.u16(s.len() as u16);
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn qid(&mut self, qid: &Qid) {
        self.u8(qid.kind);
        self.u32(qid.version);
        self.u64(qid.path);
    }
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], NinepError> {
        if self.remaining() < n {
            return Err(NinepError::Protocol(format!(
                "short message: wanted {n} bytes, {} left",
                self.remaining()
            )));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], NinepError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, NinepError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, NinepError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, NinepError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, NinepError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> Result<String, NinepError> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| NinepError::Protocol("string is not valid UTF-8".to_string()))
    }

    fn qid(&mut self) -> Result<Qid, NinepError> {
        Ok(Qid {
            kind: self.u8()?,
            version: self.u32()?,
            path: self.u64()?,
        })
    }
}
