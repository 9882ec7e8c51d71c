//! Append-only byte buffer that hands out CRLF-terminated lines.
//!
//! [`LineBuffer`] never rewrites or reorders the bytes it is given;
//! callers may freely interleave [`LineBuffer::append`] and
//! [`LineBuffer::read_line`] across however many network chunks the
//! transport happens to deliver the body in.

use memchr::memchr;

/// Append-only byte queue supporting "read a CRLF-terminated line if one
/// is complete, else signal incomplete".
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Enqueues `bytes` at the tail of the buffer.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Current queued byte count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// If a strict `\r\n` is present, returns the bytes before it
    /// (never including the terminator) and discards the line plus the
    /// terminator from the buffer. Returns `None` if no complete line is
    /// queued yet.
    pub fn read_line(&mut self) -> Option<Vec<u8>> {
        let mut search_from = 0;
        loop {
            let rel = memchr(b'\r', &self.buf[search_from..])?;
            let idx = search_from + rel;
            if self.buf.get(idx + 1) == Some(&b'\n') {
                let line = self.buf[..idx].to_vec();
                self.buf.drain(..idx + 2);
                return Some(line);
            }
            // `\r` not followed by `\n` yet (or buffer ends right after it);
            // keep scanning past this position.
            search_from = idx + 1;
            if search_from >= self.buf.len() {
                return None;
            }
        }
    }

    /// Writes all queued bytes to `writer`, emptying the buffer.
    ///
    /// # Errors
    /// Propagates any I/O error from `writer`.
    pub fn drain_to<W: std::io::Write>(&mut self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.buf)?;
        self.buf.clear();
        Ok(())
    }
}
