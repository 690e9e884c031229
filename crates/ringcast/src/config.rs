//! Configuration for rings and readers.

use crate::error::RingError;

/// Default number of slots in a ring.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default depth of a coordinator mailbox.
pub const DEFAULT_MAILBOX: usize = 64;

/// Configuration for a [`Ring`](crate::Ring).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RingConfig {
    /// Number of slots in the circular buffer. Must be non-zero.
    pub capacity: usize,
    /// Depth of the coordinator's command mailbox.
    ///
    /// Writers and readers wait for space here, so this bounds the number of
    /// commands in flight, not the number of retained values.
    pub mailbox: usize,
}

impl RingConfig {
    /// Creates a new configuration with custom settings.
    pub const fn new(capacity: usize, mailbox: usize) -> Self {
        Self { capacity, mailbox }
    }

    /// Small ring, suited to control streams and tests.
    pub const fn small() -> Self {
        Self::new(64, 16)
    }

    /// Large ring for bursty producers with slow consumers.
    pub const fn large() -> Self {
        Self::new(64 * 1024, 256)
    }

    /// Sets the slot capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the mailbox depth.
    pub fn with_mailbox(mut self, mailbox: usize) -> Self {
        self.mailbox = mailbox;
        self
    }

    /// Rejects configurations a ring cannot be built from.
    pub fn validate(&self) -> Result<(), RingError> {
        if self.capacity == 0 {
            return Err(RingError::ZeroCapacity);
        }
        if self.mailbox == 0 {
            return Err(RingError::ZeroMailbox);
        }
        Ok(())
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_MAILBOX)
    }
}

/// Per-reader behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReaderOptions {
    /// End the reader instead of waiting when it catches up with the writer.
    ///
    /// Such a reader never holds a ring open: it drains what is there and
    /// unregisters.
    pub no_starve: bool,
}

impl ReaderOptions {
    /// Options for a reader that terminates as soon as it would starve.
    pub const fn no_starve() -> Self {
        Self { no_starve: true }
    }
}
