use ninep::File;

use crate::AcmeError;

const READ_SIZE: usize = 8192;

/// An event from a window's `event` file.
///
/// `origin` is the source of the action (`E` body/tag file write, `F` other
/// file write, `K` keyboard, `M` mouse) and `kind` the action itself
/// (`x`/`X` execute, `l`/`L` look, `I`/`D` insert/delete in body, `i`/`d`
/// in tag).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    pub origin: char,
    pub kind: char,
    pub q0: u32,
    pub q1: u32,
    pub orig_q0: u32,
    pub orig_q1: u32,
    pub flag: u32,
    pub text: String,
    /// Chorded argument, if any.
    pub arg: String,
    pub loc: String,
}

impl Event {
    pub fn is_execute(&self) -> bool {
        matches!(self.kind, 'x' | 'X')
    }

    pub fn is_look(&self) -> bool {
        matches!(self.kind, 'l' | 'L')
    }

    /// Message that hands the event back to acme for default handling.
    pub fn write_back_message(&self) -> String {
        format!(
            "{}{}{} {} \n",
            self.origin, self.kind, self.orig_q0, self.orig_q1
        )
    }
}

/// Reads events from a window's open `event` file.
pub struct EventReader {
    file: File,
    buf: Vec<u8>,
}

impl EventReader {
    pub(crate) fn new(file: File) -> Self {
        Self {
            file,
            buf: Vec::new(),
        }
    }

    /// Returns the next complete event. Fails with
    /// [`AcmeError::EventsClosed`] once the window is gone.
    ///
    /// A malformed event is dropped up to the end of its line before
    /// [`AcmeError::BadEvent`] is returned, so reading can go on.
    pub async fn next(&mut self) -> Result<Event, AcmeError> {
        loop {
            match parse_event(&self.buf) {
                Ok(Some((event, used))) => {
                    self.buf.drain(..used);
                    return Ok(event);
                }
                Ok(None) => {}
                Err(err) => {
                    let end = self
                        .buf
                        .iter()
                        .position(|&b| b == b'\n')
                        .map_or(self.buf.len(), |newline| newline + 1);
                    self.buf.drain(..end);
                    return Err(err);
                }
            }
            let chunk = self.file.read_chunk(READ_SIZE).await?;
            if chunk.is_empty() {
                return Err(AcmeError::EventsClosed);
            }
            self.buf.extend_from_slice(&chunk);
        }
    }

    pub async fn write_back(&mut self, event: &Event) -> Result<(), AcmeError> {
        self.file
            .write_all(event.write_back_message().as_bytes())
            .await?;
        Ok(())
    }
}

enum Parse {
    Incomplete,
    Bad(String),
}

/// Parses one event from the front of `buf`, merging the follow-up messages
/// acme sends for expansions (flag 2) and chorded arguments (flag 8).
/// Returns `None` until enough bytes are buffered.
pub(crate) fn parse_event(buf: &[u8]) -> Result<Option<(Event, usize)>, AcmeError> {
    let mut cursor = Cursor { buf, pos: 0 };
    match cursor.event() {
        Ok(event) => Ok(Some((event, cursor.pos))),
        Err(Parse::Incomplete) => Ok(None),
        Err(Parse::Bad(reason)) => Err(AcmeError::BadEvent(reason)),
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn event(&mut self) -> Result<Event, Parse> {
        let mut event = self.raw()?;
        event.orig_q0 = event.q0;
        event.orig_q1 = event.q1;
        if event.flag & 2 != 0 {
            let expansion = self.raw()?;
            if event.q0 == event.q1 {
                event.q0 = expansion.q0;
                event.q1 = expansion.q1;
                event.text = expansion.text;
            }
        }
        if event.flag & 8 != 0 {
            event.arg = self.raw()?.text;
            event.loc = self.raw()?.text;
        }
        Ok(event)
    }

    // c1 c2 q0 ' ' q1 ' ' flag ' ' nr ' ' text '\n'
    fn raw(&mut self) -> Result<Event, Parse> {
        let origin = self.byte()? as char;
        let kind = self.byte()? as char;
        let q0 = self.number()?;
        let q1 = self.number()?;
        let flag = self.number()?;
        let runes = self.number()?;
        let text = self.runes(runes)?;
        match self.byte()? {
            b'\n' => Ok(Event {
                origin,
                kind,
                q0,
                q1,
                flag,
                text,
                ..Event::default()
            }),
            other => Err(Parse::Bad(format!(
                "expected newline after {origin}{kind} event, got {:?}",
                other as char
            ))),
        }
    }

    fn byte(&mut self) -> Result<u8, Parse> {
        let byte = *self.buf.get(self.pos).ok_or(Parse::Incomplete)?;
        self.pos += 1;
        Ok(byte)
    }

    fn number(&mut self) -> Result<u32, Parse> {
        let mut value: u32 = 0;
        loop {
            match self.byte()? {
                b' ' => return Ok(value),
                digit @ b'0'..=b'9' => {
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(u32::from(digit - b'0')))
                        .ok_or_else(|| Parse::Bad("number overflow".to_string()))?;
                }
                other => {
                    return Err(Parse::Bad(format!(
                        "unexpected {:?} in number",
                        other as char
                    )))
                }
            }
        }
    }

    fn runes(&mut self, count: u32) -> Result<String, Parse> {
        let start = self.pos;
        for _ in 0..count {
            let lead = self.byte()?;
            for _ in 1..utf8_len(lead) {
                self.byte()?;
            }
        }
        String::from_utf8(self.buf[start..self.pos].to_vec())
            .map_err(|_| Parse::Bad("text is not UTF-8".to_string()))
    }
}

fn utf8_len(lead: u8) -> usize {
    match lead {
        0xF0..=0xF7 => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}
