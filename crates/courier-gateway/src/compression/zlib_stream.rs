//! Shared-context zlib decoding
//!
//! With `compress=zlib-stream` the gateway compresses the whole connection
//! as one deflate stream. A message is complete once the buffered bytes end
//! with the sync-flush marker; every message is inflated with the same
//! context, so the state must survive between frames of one transport.

use flate2::{Decompress, FlushDecompress, Status};
use std::string::FromUtf8Error;

/// Sync-flush marker ending every complete message
pub const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

const OUTPUT_CHUNK: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum InflateError {
    #[error("Inflate failed: {0}")]
    Inflate(#[from] flate2::DecompressError),

    #[error("Inflated payload is not UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// Stateful decoder for one transport's compressed stream
pub struct ZlibStream {
    inflater: Decompress,
    buffer: Vec<u8>,
}

impl ZlibStream {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inflater: Decompress::new(true),
            buffer: Vec::new(),
        }
    }

    /// Feed one binary frame
    ///
    /// Returns the decoded text once a full message has been buffered, or
    /// `None` while waiting for more fragments.
    pub fn push(&mut self, frame: &[u8]) -> Result<Option<String>, InflateError> {
        self.buffer.extend_from_slice(frame);
        if !self.buffer.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        let input = std::mem::take(&mut self.buffer);
        let mut output = Vec::with_capacity(input.len() * 4);
        let mut consumed = 0;

        loop {
            output.reserve(OUTPUT_CHUNK);
            let in_before = self.inflater.total_in();
            let out_before = output.len();

            let status =
                self.inflater
                    .decompress_vec(&input[consumed..], &mut output, FlushDecompress::Sync)?;
            consumed += (self.inflater.total_in() - in_before) as usize;

            let progressed = self.inflater.total_in() > in_before || output.len() > out_before;
            let drained = consumed >= input.len() && output.len() < output.capacity();
            if drained || status == Status::StreamEnd || !progressed {
                break;
            }
        }

        Ok(Some(String::from_utf8(output)?))
    }

    /// Start a fresh stream, dropping any partial message
    pub fn reset(&mut self) {
        self.inflater.reset(true);
        self.buffer.clear();
    }

    /// Bytes buffered towards the next message
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for ZlibStream {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ZlibStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZlibStream")
            .field("total_in", &self.inflater.total_in())
            .field("pending", &self.buffer.len())
            .finish()
    }
}
