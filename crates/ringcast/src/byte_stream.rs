//! Byte-oriented producer and consumer wrappers around a ring.

use crate::config::RingConfig;
use crate::error::{ByteStreamError, RingError};
use crate::{Reader, Ring};
use bytes::Bytes;

/// Writes byte slices into a `Ring<Bytes>`, one value per call.
#[derive(Debug, Clone)]
pub struct ByteWriter {
    ring: Ring<Bytes>,
}

impl ByteWriter {
    /// Wraps an existing ring.
    pub fn new(ring: Ring<Bytes>) -> Self {
        Self { ring }
    }

    /// Creates a writer backed by a fresh ring of `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Result<Self, RingError> {
        Ring::new(RingConfig::default().with_capacity(capacity)).map(Self::new)
    }

    /// Copies `buf` into a new value and writes it. Returns the number of
    /// bytes written, which is always `buf.len()`.
    pub async fn write(&self, buf: &[u8]) -> Result<usize, RingError> {
        let value = Bytes::copy_from_slice(buf);
        let len = value.len();
        self.ring.write(value).await?;
        Ok(len)
    }

    /// Ends the stream; readers drain and then see end-of-stream.
    pub async fn end_of_writes(&self) -> Result<(), RingError> {
        self.ring.end_of_writes().await
    }

    /// Cancels the underlying ring.
    pub async fn close(&self) -> Result<(), RingError> {
        self.ring.cancel().await
    }

    /// Creates a reader over this writer's ring.
    pub fn reader(&self) -> ByteReader {
        ByteReader::new(self.ring.reader())
    }

    pub fn ring(&self) -> &Ring<Bytes> {
        &self.ring
    }
}

/// Reads one ring value per call into a caller-provided buffer.
#[derive(Debug)]
pub struct ByteReader {
    reader: Reader<Bytes>,
    eof: bool,
}

impl ByteReader {
    pub fn new(reader: Reader<Bytes>) -> Self {
        Self { reader, eof: false }
    }

    /// Waits for the next value and copies it into `buf`.
    ///
    /// Returns the number of bytes copied, or `Ok(0)` at end-of-stream and on
    /// every call after it. Values are never split across calls: if `buf` is
    /// shorter than the value, the prefix that fits is copied, the rest is
    /// dropped and [`ByteStreamError::BufferTooSmall`] is returned.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ByteStreamError> {
        if self.eof {
            return Ok(0);
        }

        let Some(value) = self.reader.recv().await else {
            self.eof = true;
            return Ok(0);
        };

        let copied = value.len().min(buf.len());
        buf[..copied].copy_from_slice(&value[..copied]);
        if copied < value.len() {
            return Err(ByteStreamError::BufferTooSmall {
                needed: value.len(),
                available: buf.len(),
            });
        }
        Ok(copied)
    }

    pub fn reader(&self) -> &Reader<Bytes> {
        &self.reader
    }

    /// Unwraps the underlying reader.
    pub fn into_inner(self) -> Reader<Bytes> {
        self.reader
    }
}
