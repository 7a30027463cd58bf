//! Line-oriented input for chat connections.
//!
//! Lines end at `\n`; a preceding `\r` is tolerated. Each [`Line`] keeps the
//! exact bytes received so relayed text reaches other clients unmodified.

use std::borrow::Cow;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::{HuddleError, Result};

/// A single line as received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    raw: Vec<u8>,
}

impl Line {
    /// Wrap raw bytes, terminator included if present.
    pub fn new(raw: Vec<u8>) -> Self {
        Self { raw }
    }

    /// The bytes exactly as received.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Whether the line ended with `\n` (the last line before EOF may not).
    pub fn is_terminated(&self) -> bool {
        self.raw.last() == Some(&b'\n')
    }

    /// The line content without its `\n` or `\r\n` terminator.
    pub fn content(&self) -> &[u8] {
        let mut end = self.raw.len();
        if end > 0 && self.raw[end - 1] == b'\n' {
            end -= 1;
            if end > 0 && self.raw[end - 1] == b'\r' {
                end -= 1;
            }
        }
        &self.raw[..end]
    }

    /// The content decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.content())
    }
}

/// Reads bounded lines from a buffered stream.
pub struct LineReader<R> {
    inner: R,
    max_len: usize,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    /// Create a reader that rejects lines longer than `max_len` bytes.
    pub fn new(inner: R, max_len: usize) -> Self {
        Self {
            inner,
            max_len: max_len.max(1),
        }
    }

    /// Read the next line.
    ///
    /// Returns `Ok(None)` at end of stream. A trailing fragment without a
    /// terminator is returned as a final line. A line that reaches
    /// `max_len` bytes without a terminator is an error and the reader
    /// should not be used afterwards.
    pub async fn next_line(&mut self) -> Result<Option<Line>> {
        let mut raw = Vec::new();
        let n = (&mut self.inner)
            .take(self.max_len as u64)
            .read_until(b'\n', &mut raw)
            .await?;

        if n == 0 {
            return Ok(None);
        }
        if raw.last() != Some(&b'\n') && raw.len() >= self.max_len {
            return Err(HuddleError::LineTooLong {
                limit: self.max_len,
            });
        }
        Ok(Some(Line::new(raw)))
    }

    /// Read the display-name handshake.
    ///
    /// The name is the first line with surrounding whitespace removed.
    pub async fn read_display_name(&mut self) -> Result<String> {
        match self.next_line().await? {
            Some(line) => parse_display_name(&line),
            None => Err(HuddleError::Handshake(
                "connection closed before display name".to_string(),
            )),
        }
    }
}

/// Extract a display name from a handshake line.
pub fn parse_display_name(line: &Line) -> Result<String> {
    let name = line.text().trim().to_string();
    if name.is_empty() {
        return Err(HuddleError::Handshake("empty display name".to_string()));
    }
    Ok(name)
}
