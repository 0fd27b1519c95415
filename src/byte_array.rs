//! Reusable byte buffer holding one rendered record at a time.
//!
//! The consumer thread owns a single [`ByteArray`] for the lifetime of the
//! pipeline. Each record is rendered into it, sent, and the buffer is reset
//! before the next record, so steady-state delivery does not allocate.

use std::io;

/// Growable buffer with a truncation threshold.
///
/// Payload bytes written past `max_len` are dropped and the buffer is marked
/// as truncated. A `max_len` of zero disables truncation. Framing trailers
/// are appended with [`ByteArray::push_trailer`], which ignores the threshold
/// so a truncated record is still correctly delimited on the wire.
#[derive(Debug, Default)]
pub struct ByteArray {
    buf: Vec<u8>,
    max_len: usize,
    truncated: bool,
}

impl ByteArray {
    /// Create a buffer that truncates payloads longer than `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        let initial = match max_len {
            0 => 1024,
            n => n.min(64 * 1024) + 1,
        };
        Self {
            buf: Vec::with_capacity(initial),
            max_len,
            truncated: false,
        }
    }

    /// Append payload bytes, dropping anything beyond the threshold.
    pub fn append(&mut self, bytes: &[u8]) {
        if self.max_len == 0 {
            self.buf.extend_from_slice(bytes);
            return;
        }
        let room = self.max_len.saturating_sub(self.buf.len());
        if bytes.len() > room {
            self.truncated = true;
        }
        self.buf.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    /// Append a framing trailer byte regardless of the threshold.
    pub fn push_trailer(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Number of bytes currently held.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Configured truncation threshold; zero means unlimited.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Whether any payload bytes were dropped since the last reset.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Clear the contents, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.truncated = false;
    }
}

/// Lets message builders use `write!` directly against the buffer.
impl io::Write for ByteArray {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        // Report the full length so `write_all` does not spin on truncation.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
