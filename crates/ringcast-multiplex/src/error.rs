//! Error types reported by the mux and demux dispatchers.

use ringcast::{RingError, RingId};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

/// Advisory errors raised while multiplexing.
///
/// None of these stop the component that raised them; they are delivered on
/// the error channel returned by [`Mux::new`](crate::Mux::new) and
/// [`Demux::new`](crate::Demux::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MultiplexError {
    /// The ring was added to the mux a second time.
    #[error("{ring} is already registered")]
    DuplicateRing { ring: RingId },

    /// Removal of a ring the mux does not broadcast to.
    #[error("{ring} is not registered")]
    UnknownRing { ring: RingId },

    /// A forwarding task for this source ring is already running.
    #[error("{ring} is already being forwarded")]
    DuplicateSource { ring: RingId },

    /// Removal of a forwarding task that is not registered.
    #[error("no forwarding task reads from {ring}")]
    UnknownSource { ring: RingId },

    /// Writing into a ring failed.
    #[error("write to {ring} failed: {source}")]
    Ring {
        ring: RingId,
        #[source]
        source: RingError,
    },

    /// The dispatcher has stopped.
    #[error("dispatcher has stopped")]
    Stopped,
}

impl MultiplexError {
    /// Returns `true` for duplicate or unknown registrations.
    #[inline]
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateRing { .. }
                | Self::UnknownRing { .. }
                | Self::DuplicateSource { .. }
                | Self::UnknownSource { .. }
        )
    }

    /// Returns `true` if the dispatcher can no longer be reached.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Receiving end of a dispatcher's error channel.
pub type ErrorReceiver = mpsc::UnboundedReceiver<MultiplexError>;

/// Sending end of a dispatcher's error channel.
#[derive(Debug, Clone)]
pub(crate) struct ErrorSink {
    owner: &'static str,
    errors: mpsc::UnboundedSender<MultiplexError>,
}

impl ErrorSink {
    pub(crate) fn channel(owner: &'static str) -> (Self, ErrorReceiver) {
        let (errors, receiver) = mpsc::unbounded_channel();
        (Self { owner, errors }, receiver)
    }

    /// Logs `error` and forwards it to the supervisor, if it is still
    /// listening.
    pub(crate) fn report(&self, error: MultiplexError) {
        warn!(owner = self.owner, %error, "multiplex error");
        let _ = self.errors.send(error);
    }
}
