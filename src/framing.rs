//! Syslog-over-TCP framing.
//!
//! Two framings are supported. Non-transparent framing terminates each
//! message with a line feed; the payload itself must not contain one, as no
//! escaping is performed. Octet-counting framing prefixes each message with
//! its byte length in ASCII decimal followed by a single space.
//!
//! The encoders are split into a prefix and a trailer so the transmitter can
//! write the prefix as its own write and append the trailer into the record
//! buffer without copying the payload. [`FrameDecoder`] performs the inverse
//! for anything reading the stream.

use std::{fmt, str::FromStr};

use serde::Deserialize;
use thiserror::Error;

/// Delimiter used by non-transparent framing.
pub const LINE_FEED: u8 = b'\n';

/// Longest length prefix accepted by [`FrameDecoder`] before the separator.
const MAX_PREFIX_DIGITS: usize = 20;

/// Wire framing applied to each message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMethod {
    /// Message followed by a line feed.
    NonTransparent,
    /// Message preceded by `"<len> "`.
    #[default]
    OctetCounting,
}

impl fmt::Display for FramingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingMethod::NonTransparent => f.write_str("non_transparent"),
            FramingMethod::OctetCounting => f.write_str("octet_counting"),
        }
    }
}

impl FromStr for FramingMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "non_transparent" | "nontransparent" => Ok(Self::NonTransparent),
            "octet_counting" | "octetcounting" => Ok(Self::OctetCounting),
            _ => Err(()),
        }
    }
}

impl FramingMethod {
    /// Bytes to write ahead of a payload of `payload_len` bytes.
    pub fn prefix(&self, payload_len: usize) -> Option<Vec<u8>> {
        match self {
            FramingMethod::NonTransparent => None,
            FramingMethod::OctetCounting => Some(format!("{payload_len} ").into_bytes()),
        }
    }

    /// Byte to append after the payload.
    pub fn trailer(&self) -> Option<u8> {
        match self {
            FramingMethod::NonTransparent => Some(LINE_FEED),
            FramingMethod::OctetCounting => None,
        }
    }

    /// Frame `payload` into a fresh buffer.
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let prefix = self.prefix(payload.len()).unwrap_or_default();
        let mut framed = Vec::with_capacity(prefix.len() + payload.len() + 1);
        framed.extend_from_slice(&prefix);
        framed.extend_from_slice(payload);
        framed.extend(self.trailer());
        framed
    }
}

/// Errors raised while decoding a framed stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid octet count prefix: {0:?}")]
    InvalidPrefix(String),
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    TooLarge { len: usize, max: usize },
}

/// Incremental decoder splitting a byte stream into payloads.
#[derive(Debug)]
pub struct FrameDecoder {
    method: FramingMethod,
    max_frame: usize,
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new(method: FramingMethod, max_frame: usize) -> Self {
        Self {
            method,
            max_frame,
            buf: Vec::new(),
        }
    }

    /// Feed bytes read from the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet returned as a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Return the next complete payload, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        match self.method {
            FramingMethod::NonTransparent => Ok(self.next_delimited()),
            FramingMethod::OctetCounting => self.next_counted(),
        }
    }

    fn next_delimited(&mut self) -> Option<Vec<u8>> {
        let end = self.buf.iter().position(|b| *b == LINE_FEED)?;
        let mut frame: Vec<u8> = self.buf.drain(..=end).collect();
        frame.pop();
        Some(frame)
    }

    fn next_counted(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let Some(space) = self.buf.iter().take(MAX_PREFIX_DIGITS + 1).position(|b| *b == b' ')
        else {
            if self.buf.len() > MAX_PREFIX_DIGITS {
                return Err(self.invalid_prefix(MAX_PREFIX_DIGITS));
            }
            return Ok(None);
        };
        let digits = &self.buf[..space];
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(self.invalid_prefix(space));
        }
        let len: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.invalid_prefix(space))?;
        if self.max_frame != 0 && len > self.max_frame {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame,
            });
        }
        let start = space + 1;
        if self.buf.len() < start + len {
            return Ok(None);
        }
        let frame = self.buf[start..start + len].to_vec();
        self.buf.drain(..start + len);
        Ok(Some(frame))
    }

    fn invalid_prefix(&self, end: usize) -> FrameError {
        FrameError::InvalidPrefix(String::from_utf8_lossy(&self.buf[..end]).into_owned())
    }
}
