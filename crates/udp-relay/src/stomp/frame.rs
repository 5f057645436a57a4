// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! STOMP 1.2 frame codec.
//!
//! Wire format:
//!
//! ```text
//! COMMAND\n
//! header1:value1\n
//! header2:value2\n
//! \n
//! body^@
//! ```
//!
//! Bare EOLs between frames are heart-beats.

use super::ProtocolError;

pub const CONNECT: &str = "CONNECT";
pub const CONNECTED: &str = "CONNECTED";
pub const SEND: &str = "SEND";
pub const DISCONNECT: &str = "DISCONNECT";
pub const RECEIPT: &str = "RECEIPT";
pub const ERROR: &str = "ERROR";

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of the first header called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize the frame, NUL terminator included.
    pub fn encode(&self) -> Vec<u8> {
        let escape = escapes_headers(&self.command);
        let mut out = Vec::with_capacity(self.command.len() + 64 + self.body.len());
        out.extend_from_slice(self.command.as_bytes());
        out.push(b'\n');
        for (name, value) in &self.headers {
            if escape {
                out.extend_from_slice(escape_header(name).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape_header(value).as_bytes());
            } else {
                out.extend_from_slice(name.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }
}

/// `CONNECT` and `CONNECTED` headers are never escaped.
fn escapes_headers(command: &str) -> bool {
    command != CONNECT && command != CONNECTED
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, ProtocolError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(ProtocolError::InvalidEscape(format!(
                    "\\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

/// Item produced by [`FrameDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Frame(Frame),
    Heartbeat,
}

/// Incremental frame decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_frame_size: usize,
}

impl FrameDecoder {
    /// Create a decoder rejecting frames larger than `max_frame_size`.
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(4096),
            max_frame_size,
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes buffered but not yet decoded.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next item, or `Ok(None)` if more bytes are needed.
    pub fn next_item(&mut self) -> Result<Option<Decoded>, ProtocolError> {
        match self.buf.first() {
            None => return Ok(None),
            Some(b'\n') => {
                self.buf.drain(..1);
                return Ok(Some(Decoded::Heartbeat));
            }
            Some(b'\r') => {
                return match self.buf.get(1) {
                    None => Ok(None),
                    Some(b'\n') => {
                        self.buf.drain(..2);
                        Ok(Some(Decoded::Heartbeat))
                    }
                    Some(_) => Err(ProtocolError::Malformed("stray carriage return".into())),
                };
            }
            Some(_) => {}
        }

        match self.parse()? {
            Some((frame, consumed)) => {
                self.buf.drain(..consumed);
                Ok(Some(Decoded::Frame(frame)))
            }
            None if self.buf.len() > self.max_frame_size => Err(ProtocolError::FrameTooLarge {
                size: self.buf.len(),
                limit: self.max_frame_size,
            }),
            None => Ok(None),
        }
    }

    /// Parse one frame from the start of the buffer.
    fn parse(&self) -> Result<Option<(Frame, usize)>, ProtocolError> {
        let mut pos = 0;

        let Some((command, next)) = read_line(&self.buf, pos)? else {
            return Ok(None);
        };
        pos = next;
        if command.is_empty() {
            return Err(ProtocolError::Malformed("empty command".into()));
        }
        let escape = escapes_headers(&command);

        let mut headers = Vec::new();
        loop {
            let Some((line, next)) = read_line(&self.buf, pos)? else {
                return Ok(None);
            };
            pos = next;
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ProtocolError::Malformed(format!("header without colon: {line}")))?;
            if escape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| ProtocolError::Malformed(format!("bad content-length: {v}")))
            })
            .transpose()?;

        let body_end = match content_length {
            Some(len) => {
                let end = match pos.checked_add(len) {
                    Some(end) if len <= self.max_frame_size => end,
                    _ => {
                        return Err(ProtocolError::FrameTooLarge {
                            size: len,
                            limit: self.max_frame_size,
                        })
                    }
                };
                if self.buf.len() <= end {
                    return Ok(None);
                }
                if self.buf[end] != 0 {
                    return Err(ProtocolError::Malformed(
                        "body not terminated by NUL".into(),
                    ));
                }
                end
            }
            None => match self.buf[pos..].iter().position(|&b| b == 0) {
                Some(offset) => pos + offset,
                None => return Ok(None),
            },
        };

        let frame = Frame {
            command,
            headers,
            body: self.buf[pos..body_end].to_vec(),
        };
        Ok(Some((frame, body_end + 1)))
    }
}

/// Read a line starting at `start`, without its EOL.
fn read_line(buf: &[u8], start: usize) -> Result<Option<(String, usize)>, ProtocolError> {
    let Some(offset) = buf[start..].iter().position(|&b| b == b'\n') else {
        return Ok(None);
    };
    let end = start + offset;
    let line = buf[start..end].strip_suffix(b"\r").unwrap_or(&buf[start..end]);
    let line = std::str::from_utf8(line)
        .map_err(|_| ProtocolError::Malformed("header is not UTF-8".into()))?;
    Ok(Some((line.to_string(), end + 1)))
}
