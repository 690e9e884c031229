//! Error types for ring and adapter operations.

use thiserror::Error;

/// Errors produced by a [`Ring`](crate::Ring) or its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// A ring cannot be built without slots.
    #[error("ring capacity must be greater than zero")]
    ZeroCapacity,

    /// A coordinator cannot be built without a mailbox.
    #[error("ring mailbox must be greater than zero")]
    ZeroMailbox,

    /// The coordinator has exited and no longer accepts commands.
    #[error("ring coordinator has stopped")]
    Stopped,
}

impl RingError {
    /// Returns `true` for errors raised while building a ring.
    #[inline]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ZeroCapacity | Self::ZeroMailbox)
    }

    /// Returns `true` if the ring is permanently unusable.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Errors produced by the byte-stream adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ByteStreamError {
    /// The destination buffer could not hold the whole value.
    ///
    /// The first `available` bytes were copied and the reader moved on.
    #[error("buffer of {available} bytes is too small for a {needed} byte value")]
    BufferTooSmall {
        /// Length of the value that was read.
        needed: usize,
        /// Length of the caller's buffer.
        available: usize,
    },

    /// The underlying ring failed.
    #[error(transparent)]
    Ring(#[from] RingError),
}
