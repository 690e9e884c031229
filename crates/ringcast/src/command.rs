//! Messages exchanged with a ring coordinator.

use crate::{Cursor, ReaderId};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};

/// Outcome of a single pull against a ring.
///
/// An explicit tag rather than a sentinel value, so an empty payload is never
/// mistaken for the end of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus<T> {
    /// The next value for this reader.
    Value(T),
    /// The reader is caught up and will be woken by the next write.
    Starving,
    /// No more values will ever be delivered to this reader.
    EndOfStream,
}

impl<T> ReadStatus<T> {
    /// Returns the value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` for [`ReadStatus::EndOfStream`].
    #[inline]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

/// Coordinator answer to a pull, carrying the reader's new cursor.
pub(crate) enum PullReply<T> {
    Value { value: T, cursor: Cursor },
    Starving,
    EndOfStream,
}

/// A reader announced by [`Ring::reader`](crate::Ring::reader).
///
/// Sent on an unbounded side channel before the reader is handed out, so the
/// coordinator always learns of a reader before any command that names it.
pub(crate) struct Registration {
    pub(crate) reader: ReaderId,
    pub(crate) wake: Arc<Notify>,
}

pub(crate) enum Command<T> {
    /// Terminal cancellation of the coordinator.
    Cancel,
    /// No more writes will be accepted.
    EndOfWrites,
    /// Unconditional write.
    Write(T),
    /// Write unless it would overrun `watched`.
    WriteOrStarve {
        value: T,
        watched: Option<ReaderId>,
        reply: oneshot::Sender<bool>,
    },
    /// A reader asks for its next value.
    Pull {
        reader: ReaderId,
        reply: oneshot::Sender<PullReply<T>>,
    },
    /// A reader is asked to stop at its next pull.
    CancelReader(ReaderId),
    /// A reader has exited; `ack` fires once its slot is released.
    Unregister {
        reader: ReaderId,
        ack: Option<oneshot::Sender<()>>,
    },
    /// Which of `readers` is furthest behind.
    Slowest {
        readers: Vec<ReaderId>,
        reply: oneshot::Sender<Option<ReaderId>>,
    },
}

impl<T> Command<T> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Cancel => "cancel",
            Self::EndOfWrites => "end_of_writes",
            Self::Write(_) => "write",
            Self::WriteOrStarve { .. } => "write_or_starve",
            Self::Pull { .. } => "pull",
            Self::CancelReader(_) => "cancel_reader",
            Self::Unregister { .. } => "unregister",
            Self::Slowest { .. } => "slowest",
        }
    }
}
