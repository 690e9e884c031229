//! Configuration for the mux and demux dispatchers.

use ringcast::{RingConfig, RingError, DEFAULT_MAILBOX};

/// Configuration for a [`Mux`](crate::Mux).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MuxConfig {
    /// Number of queued commands (adds, removes, writes) before callers wait.
    ///
    /// Default: 64
    pub mailbox: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            mailbox: DEFAULT_MAILBOX,
        }
    }
}

impl MuxConfig {
    pub const fn new(mailbox: usize) -> Self {
        Self { mailbox }
    }

    /// Sets the mailbox size.
    pub fn with_mailbox(mut self, mailbox: usize) -> Self {
        self.mailbox = mailbox;
        self
    }

    pub fn validate(&self) -> Result<(), RingError> {
        if self.mailbox == 0 {
            return Err(RingError::ZeroMailbox);
        }
        Ok(())
    }
}

/// Configuration for a [`Demux`](crate::Demux).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DemuxConfig {
    /// Shape of the shared destination ring.
    ///
    /// Default: 1024 slots
    pub ring: RingConfig,

    /// Number of queued dispatcher commands before callers wait.
    ///
    /// Default: 64
    pub mailbox: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            ring: RingConfig::default(),
            mailbox: DEFAULT_MAILBOX,
        }
    }
}

impl DemuxConfig {
    pub const fn new(ring: RingConfig, mailbox: usize) -> Self {
        Self { ring, mailbox }
    }

    /// Sets the destination ring configuration.
    pub fn with_ring(mut self, ring: RingConfig) -> Self {
        self.ring = ring;
        self
    }

    /// Sets the mailbox size.
    pub fn with_mailbox(mut self, mailbox: usize) -> Self {
        self.mailbox = mailbox;
        self
    }

    pub fn validate(&self) -> Result<(), RingError> {
        self.ring.validate()?;
        if self.mailbox == 0 {
            return Err(RingError::ZeroMailbox);
        }
        Ok(())
    }
}
