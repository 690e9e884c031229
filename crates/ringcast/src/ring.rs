use crate::command::{Command, Registration};
use crate::config::{ReaderOptions, RingConfig};
use crate::coordinator;
use crate::error::RingError;
use crate::reader::{Reader, ReaderId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Notify};

static NEXT_RING_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RingId(u64);

impl RingId {
    pub(crate) fn next() -> Self {
        Self(NEXT_RING_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ring#{}", self.0)
    }
}

/// Handle to a broadcast ring buffer.
///
/// The buffer itself lives in a coordinator task spawned by [`Ring::new`];
/// this handle only holds its mailbox. Handles are cheap to clone and compare
/// equal when they refer to the same ring.
///
/// One logical producer writes with [`write`](Ring::write) or
/// [`write_or_starve`](Ring::write_or_starve); any number of
/// [`Reader`]s consume independently at their own pace. A reader that falls
/// more than one lap behind is moved to the oldest retained value and silently
/// loses what it missed.
pub struct Ring<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    id: RingId,
    capacity: usize,
    commands: mpsc::Sender<Command<T>>,
    registrations: mpsc::UnboundedSender<Registration>,
    stopped: watch::Receiver<bool>,
    next_reader: AtomicU64,
}

impl<T: Clone + Send + 'static> Ring<T> {
    /// Creates a ring and spawns its coordinator on the current tokio runtime.
    ///
    /// A zero capacity or mailbox is rejected rather than clamped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(config: RingConfig) -> Result<Self, RingError> {
        config.validate()?;

        let id = RingId::next();
        let (commands, registrations, stopped) =
            coordinator::spawn(id, config.capacity, config.mailbox);

        Ok(Self {
            shared: Arc::new(Shared {
                id,
                capacity: config.capacity,
                commands,
                registrations,
                stopped,
                next_reader: AtomicU64::new(1),
            }),
        })
    }

    /// Creates a ring of `capacity` slots with the default mailbox.
    pub fn with_capacity(capacity: usize) -> Result<Self, RingError> {
        Self::new(RingConfig::default().with_capacity(capacity))
    }

    /// Appends `value`, overwriting the oldest slot once the ring is full.
    ///
    /// Returns once the coordinator's mailbox has taken the write; readers see
    /// it after the coordinator applies it. A write to a read-only ring is
    /// silently dropped.
    pub async fn write(&self, value: T) -> Result<(), RingError> {
        self.send(Command::Write(value)).await
    }

    /// Appends `value` unless doing so would overwrite the next slot `watched`
    /// has yet to read.
    ///
    /// Returns `Ok(false)` when the write was refused; the ring is unchanged
    /// and the call may be retried. With no watched reader, or one that has
    /// already unregistered, every write is accepted. A read-only ring refuses
    /// every write.
    pub async fn write_or_starve(
        &self,
        value: T,
        watched: Option<ReaderId>,
    ) -> Result<bool, RingError> {
        let (reply, accepted) = oneshot::channel();
        self.send(Command::WriteOrStarve {
            value,
            watched,
            reply,
        })
        .await?;
        accepted.await.map_err(|_| RingError::Stopped)
    }

    /// Marks the ring read-only.
    ///
    /// Readers drain what was written and then see end-of-stream; readers
    /// currently waiting are woken to find out.
    pub async fn end_of_writes(&self) -> Result<(), RingError> {
        self.send(Command::EndOfWrites).await
    }

    /// Requests termination of the coordinator.
    ///
    /// With no reader waiting for data, the coordinator stops at once. Otherwise
    /// the ring turns read-only, waiting readers are woken with end-of-stream,
    /// and the coordinator stops after all of them have unregistered. A reader
    /// that is held but never polled or canceled therefore keeps the ring
    /// alive; releasing readers is the caller's job.
    ///
    /// Cancelling a ring that has already stopped is a no-op.
    pub async fn cancel(&self) -> Result<(), RingError> {
        match self.send(Command::Cancel).await {
            Err(RingError::Stopped) => Ok(()),
            other => other,
        }
    }

    /// Returns whichever of `readers` is furthest behind.
    ///
    /// Use it to pick the reader to pass to
    /// [`write_or_starve`](Ring::write_or_starve) when backpressure should
    /// follow the slowest consumer. Readers that have unregistered are
    /// skipped; `None` means none of `readers` is still registered.
    pub async fn slowest_reader(
        &self,
        readers: &[ReaderId],
    ) -> Result<Option<ReaderId>, RingError> {
        let (reply, slowest) = oneshot::channel();
        self.send(Command::Slowest {
            readers: readers.to_vec(),
            reply,
        })
        .await?;
        slowest.await.map_err(|_| RingError::Stopped)
    }

    /// Creates a reader positioned at the first value ever written.
    pub fn reader(&self) -> Reader<T> {
        self.reader_with_options(ReaderOptions::default())
    }

    /// Creates a reader with custom options.
    ///
    /// The coordinator learns of the reader before it sees any command sent
    /// after this call, so the reader is watched and cancelable at once.
    pub fn reader_with_options(&self, options: ReaderOptions) -> Reader<T> {
        let id = ReaderId::from_raw(self.shared.next_reader.fetch_add(1, Ordering::Relaxed));
        let wake = Arc::new(Notify::new());
        // A stopped coordinator answers the reader's first pull with
        // end-of-stream.
        let _ = self.shared.registrations.send(Registration {
            reader: id,
            wake: Arc::clone(&wake),
        });
        Reader::new(self.clone(), id, options, wake)
    }

    pub(crate) async fn send(&self, command: Command<T>) -> Result<(), RingError> {
        self.shared
            .commands
            .send(command)
            .await
            .map_err(|_| RingError::Stopped)
    }
}

impl<T> Ring<T> {
    /// Identity of this ring.
    #[inline]
    pub fn id(&self) -> RingId {
        self.shared.id
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Returns `true` once the coordinator has exited.
    pub fn is_stopped(&self) -> bool {
        *self.shared.stopped.borrow() || self.shared.commands.is_closed()
    }

    /// Resolves once the coordinator has exited.
    pub async fn stopped(&self) {
        let mut stopped = self.shared.stopped.clone();
        // A dropped sender means the coordinator task is gone as well.
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }

    /// Best-effort command delivery for contexts that cannot await.
    pub(crate) fn try_send(&self, command: Command<T>) -> Result<(), Command<T>>
    where
        T: Send + 'static,
    {
        match self.shared.commands.try_send(command) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(command)) => Err(command),
            Err(mpsc::error::TrySendError::Full(command)) => {
                // Hand the command to a task that can wait for mailbox space.
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        let commands = self.shared.commands.clone();
                        handle.spawn(async move {
                            let _ = commands.send(command).await;
                        });
                        Ok(())
                    }
                    Err(_) => Err(command),
                }
            }
        }
    }
}

impl<T> Clone for Ring<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> PartialEq for Ring<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<T> Eq for Ring<T> {}

impl<T> fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring")
            .field("id", &self.shared.id)
            .field("capacity", &self.shared.capacity)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
