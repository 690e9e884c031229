//! Per-consumer cursor into a ring.

use crate::command::{Command, PullReply, ReadStatus};
use crate::config::ReaderOptions;
use crate::error::RingError;
use crate::invariants::debug_assert_forward;
use crate::{Cursor, Ring};
use futures_core::Stream;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};

/// Identity of a reader, unique within its ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReaderId(u64);

impl ReaderId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reader#{}", self.0)
    }
}

/// Boxed stream of values produced by [`Reader::into_stream`].
pub type ReaderStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

/// An independent consumer of a [`Ring`].
///
/// Every reader starts at the first value ever written and moves at its own
/// pace; readers never block each other or the writer. The reader's cursor is
/// kept by the ring's coordinator; the reader holds the last position it was
/// told about.
///
/// When the reader catches up it parks until the next write. That wait is
/// invisible to the consumer apart from latency: [`recv`](Reader::recv) only
/// returns a value or `None` at end-of-stream.
///
/// Dropping an unfinished reader unregisters it on a best-effort basis.
pub struct Reader<T: Send + 'static> {
    ring: Ring<T>,
    id: ReaderId,
    cursor: Cursor,
    wake: Arc<Notify>,
    options: ReaderOptions,
    exhausted: bool,
    unregistered: bool,
}

impl<T: Clone + Send + 'static> Reader<T> {
    pub(crate) fn new(
        ring: Ring<T>,
        id: ReaderId,
        options: ReaderOptions,
        wake: Arc<Notify>,
    ) -> Self {
        Self {
            ring,
            id,
            cursor: Cursor::default(),
            wake,
            options,
            exhausted: false,
            unregistered: false,
        }
    }

    /// Waits for the next value.
    ///
    /// Returns `None` once the ring is read-only and drained, the reader was
    /// canceled, the coordinator stopped, or (in no-starve mode) the reader
    /// caught up. After `None` every further call returns `None`.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.pull().await {
                ReadStatus::Value(value) => return Some(value),
                ReadStatus::EndOfStream => {
                    self.unregister().await;
                    return None;
                }
                ReadStatus::Starving => {
                    if self.options.no_starve {
                        self.unregister().await;
                        return None;
                    }
                    // Woken by a write, end-of-writes, a ring cancel or our
                    // own cancellation; ask again either way.
                    self.wake.notified().await;
                }
            }
        }
    }

    /// Makes a single pull without waiting out starvation.
    ///
    /// Returns [`ReadStatus::Starving`] when the reader is caught up. The
    /// reader unregisters itself when it returns
    /// [`ReadStatus::EndOfStream`].
    pub async fn try_recv(&mut self) -> ReadStatus<T> {
        let status = self.pull().await;
        if status.is_end_of_stream() {
            self.unregister().await;
        }
        status
    }

    /// Converts the reader into a stream of values.
    pub fn into_stream(self) -> ReaderStream<T> {
        Box::pin(futures_util::stream::unfold(self, |mut reader| async move {
            reader.recv().await.map(|value| (value, reader))
        }))
    }

    /// Requests cancellation. The reader ends at its next pull, including one
    /// that is currently waiting for data.
    pub async fn cancel(&self) -> Result<(), RingError> {
        self.canceller().cancel().await
    }

    /// Returns a handle that can cancel this reader from another task while
    /// it is being consumed.
    pub fn canceller(&self) -> ReaderCanceller<T> {
        ReaderCanceller {
            ring: self.ring.clone(),
            reader: self.id,
        }
    }

    async fn pull(&mut self) -> ReadStatus<T> {
        if self.exhausted {
            return ReadStatus::EndOfStream;
        }

        let (reply, response) = oneshot::channel();
        let command = Command::Pull {
            reader: self.id,
            reply,
        };
        if self.ring.send(command).await.is_err() {
            return ReadStatus::EndOfStream;
        }

        match response.await {
            Ok(PullReply::Value { value, cursor }) => {
                debug_assert_forward!(
                    "reader cursor",
                    self.cursor.sequence(self.ring.capacity()),
                    cursor.sequence(self.ring.capacity())
                );
                self.cursor = cursor;
                ReadStatus::Value(value)
            }
            Ok(PullReply::Starving) => ReadStatus::Starving,
            Ok(PullReply::EndOfStream) | Err(_) => ReadStatus::EndOfStream,
        }
    }

    /// Tells the coordinator this reader is done and waits until it has
    /// released the reader's slot.
    async fn unregister(&mut self) {
        self.exhausted = true;
        if self.unregistered {
            return;
        }

        let (ack, acked) = oneshot::channel();
        let command = Command::Unregister {
            reader: self.id,
            ack: Some(ack),
        };
        if self.ring.send(command).await.is_ok() {
            self.unregistered = true;
            let _ = acked.await;
        } else {
            // Coordinator is gone; nothing left to release.
            self.unregistered = true;
        }
    }
}

impl<T: Send + 'static> Reader<T> {
    /// Identity of this reader within its ring.
    #[inline]
    pub fn id(&self) -> ReaderId {
        self.id
    }

    /// The ring this reader consumes.
    #[inline]
    pub fn ring(&self) -> &Ring<T> {
        &self.ring
    }

    /// Position after the last value this reader received.
    #[inline]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Returns `true` once the reader has reached end-of-stream.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    /// Replaces the reader's options; they apply from the next pull.
    pub fn set_options(&mut self, options: ReaderOptions) {
        self.options = options;
    }
}

impl<T: Send + 'static> Drop for Reader<T> {
    fn drop(&mut self) {
        if !self.unregistered {
            let _ = self.ring.try_send(Command::Unregister {
                reader: self.id,
                ack: None,
            });
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Reader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("ring", &self.ring.id())
            .field("id", &self.id)
            .field("cursor", &self.cursor)
            .field("options", &self.options)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

/// Cloneable handle that cancels a [`Reader`] from any task.
pub struct ReaderCanceller<T> {
    ring: Ring<T>,
    reader: ReaderId,
}

impl<T: Clone + Send + 'static> ReaderCanceller<T> {
    /// Requests cancellation of the reader.
    ///
    /// If the reader is waiting for data it is woken immediately. A value
    /// already on its way to the reader may still be delivered.
    pub async fn cancel(&self) -> Result<(), RingError> {
        self.ring.send(Command::CancelReader(self.reader)).await
    }

    /// Requests cancellation without waiting for mailbox space.
    ///
    /// Returns `false` if the request could not be queued because the
    /// coordinator has stopped, in which case the reader ends anyway.
    pub fn try_cancel(&self) -> bool {
        self.ring
            .try_send(Command::CancelReader(self.reader))
            .is_ok()
    }

    /// The reader this handle cancels.
    pub fn reader(&self) -> ReaderId {
        self.reader
    }
}

impl<T> Clone for ReaderCanceller<T> {
    fn clone(&self) -> Self {
        Self {
            ring: self.ring.clone(),
            reader: self.reader,
        }
    }
}

impl<T> fmt::Debug for ReaderCanceller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderCanceller")
            .field("ring", &self.ring.id())
            .field("reader", &self.reader)
            .finish()
    }
}
