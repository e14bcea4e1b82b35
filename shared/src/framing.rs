//! Newline-delimited JSON framing for byte streams.
//!
//! Each message on the wire is one JSON object followed by `\n`:
//!
//! ```text
//! {"type":"update","x":120.0,"y":88.5}\n
//! {"type":"shoot","dx":1.0,"dy":0.0}\n
//! ```
//!
//! Reads may split or merge records arbitrarily, so the framer keeps a
//! growing per-connection buffer and only yields complete lines. A record that
//! fails to parse is reported on its own and never poisons the records around
//! it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Longest partial record kept in the buffer before it is discarded.
pub const MAX_LINE_LEN: usize = 64 * 1024;

const READ_CHUNK: usize = 4096;

/// Outcome of a framing operation that did not yield a message.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The peer closed the stream (a read returned zero bytes).
    #[error("connection closed")]
    Closed,

    /// The transport failed while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A complete record was received but is not a valid message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A record grew past [`MAX_LINE_LEN`] and was dropped.
    #[error("record exceeds {max} bytes")]
    LineTooLong { max: usize },
}

impl FrameError {
    /// Parse-level failures leave the connection usable; everything else ends it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::Malformed(_) | FrameError::LineTooLong { .. })
    }
}

/// Splits an incoming byte stream into newline-terminated records.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line: usize,
    discarding: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_LEN)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
            discarding: false,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes waiting for a terminating newline.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Pops the next complete, non-blank record.
    pub fn next_line(&mut self) -> Option<Result<String, FrameError>> {
        loop {
            let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') else {
                if self.buffer.len() > self.max_line {
                    self.buffer.clear();
                    self.discarding = true;
                }
                return None;
            };

            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.discarding || raw.len() > self.max_line + 1 {
                self.discarding = false;
                return Some(Err(FrameError::LineTooLong { max: self.max_line }));
            }

            let text = String::from_utf8_lossy(&raw);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }
            return Some(Ok(line.to_string()));
        }
    }

    /// Decodes every complete record currently buffered, in arrival order.
    pub fn decode_all<T: DeserializeOwned>(&mut self) -> Vec<Result<T, FrameError>> {
        let mut decoded = Vec::new();
        while let Some(line) = self.next_line() {
            decoded.push(line.and_then(|l| serde_json::from_str(&l).map_err(FrameError::from)));
        }
        decoded
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads framed messages from an async byte stream.
pub struct FramedReader<R> {
    reader: R,
    framer: LineFramer,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FramedReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            framer: LineFramer::new(),
            chunk: vec![0u8; READ_CHUNK],
        }
    }

    /// Performs one read and returns every record it completed.
    ///
    /// The batch may be empty when the read only extended a partial record.
    /// Returns [`FrameError::Closed`] on end of stream and
    /// [`FrameError::Io`] when the transport fails.
    pub async fn read_batch<T: DeserializeOwned>(
        &mut self,
    ) -> Result<Vec<Result<T, FrameError>>, FrameError> {
        let n = self.reader.read(&mut self.chunk).await?;
        if n == 0 {
            return Err(FrameError::Closed);
        }
        self.framer.extend(&self.chunk[..n]);
        Ok(self.framer.decode_all())
    }
}

/// Serializes one message as a JSON line, including the trailing newline.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, FrameError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}
