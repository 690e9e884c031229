//! The single task that owns a ring's buffer and reader bookkeeping.

use crate::command::{Command, PullReply, Registration};
use crate::cursor::{slowest, ReadOutcome, Slots};
use crate::invariants::debug_assert_watched_retained;
use crate::{Cursor, ReaderId, RingId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, trace};

// =============================================================================
// OWNERSHIP MODEL
// =============================================================================
//
// The coordinator is the only code that touches the slots, the write cursor
// and reader cursors. Every other party talks to it through the mailbox, and
// commands are applied one at a time in arrival order. That gives:
//
// - a total order over the writes to one ring,
// - reads that never observe a half-applied write,
// - no locks around the buffer.
//
// Readers are announced on a separate unbounded channel when they are
// created and are admitted before the next command is applied. A reader the
// coordinator does not know has therefore already unregistered: it reads
// end-of-stream, ignores cancellation and exerts no backpressure.
//
// Readers that find nothing to read are answered `Starving` and parked on
// their own `Notify`. Any state change that could help them (write,
// end-of-writes, cancel) drains the starving set and notifies each one. A
// `Notify` keeps a permit if the reader has not started waiting yet, so a wake
// that races ahead of the wait is not lost.
//
// =============================================================================

enum Flow {
    Continue,
    Stop,
}

struct ReaderSlot {
    cursor: Cursor,
    wake: Arc<Notify>,
}

pub(crate) struct Coordinator<T> {
    ring: RingId,
    slots: Slots<T>,
    read_only: bool,
    readers: HashMap<ReaderId, ReaderSlot>,
    starving: HashSet<ReaderId>,
    canceled: HashSet<ReaderId>,
    /// Readers woken by a terminal cancel that have not unregistered yet.
    draining: HashSet<ReaderId>,
    stopping: bool,
    commands: mpsc::Receiver<Command<T>>,
    registrations: mpsc::UnboundedReceiver<Registration>,
    stopped: watch::Sender<bool>,
}

impl<T: Clone + Send + 'static> Coordinator<T> {
    pub(crate) fn new(
        ring: RingId,
        capacity: usize,
        commands: mpsc::Receiver<Command<T>>,
        registrations: mpsc::UnboundedReceiver<Registration>,
        stopped: watch::Sender<bool>,
    ) -> Self {
        Self {
            ring,
            slots: Slots::new(capacity),
            read_only: false,
            readers: HashMap::new(),
            starving: HashSet::new(),
            canceled: HashSet::new(),
            draining: HashSet::new(),
            stopping: false,
            commands,
            registrations,
            stopped,
        }
    }

    /// Processes commands until a terminal cancel completes or every handle
    /// to the ring is gone.
    pub(crate) async fn run(mut self) {
        debug!(ring = %self.ring, capacity = self.slots.capacity(), "coordinator started");

        while let Some(command) = self.commands.recv().await {
            self.admit_readers();
            trace!(ring = %self.ring, command = command.kind(), "dispatch");
            if let Flow::Stop = self.dispatch(command) {
                break;
            }
        }

        self.commands.close();
        debug!(
            ring = %self.ring,
            written = self.slots.head().sequence(self.slots.capacity()),
            "coordinator stopped"
        );
        self.stopped.send_replace(true);
    }

    fn dispatch(&mut self, command: Command<T>) -> Flow {
        match command {
            Command::Cancel => return self.cancel(),
            Command::EndOfWrites => {
                self.read_only = true;
                self.wake_starving();
            }
            Command::Write(value) => {
                if !self.read_only {
                    self.slots.write(value);
                    self.wake_starving();
                }
            }
            Command::WriteOrStarve {
                value,
                watched,
                reply,
            } => {
                let accepted = self.write_or_starve(value, watched);
                let _ = reply.send(accepted);
            }
            Command::Pull { reader, reply } => {
                let _ = reply.send(self.pull(reader));
            }
            Command::CancelReader(reader) => {
                // A reader that already left has nothing to cancel.
                if let Some(slot) = self.readers.get(&reader) {
                    self.canceled.insert(reader);
                    if self.starving.remove(&reader) {
                        slot.wake.notify_one();
                    }
                }
            }
            Command::Unregister { reader, ack } => {
                self.readers.remove(&reader);
                self.starving.remove(&reader);
                self.canceled.remove(&reader);
                self.draining.remove(&reader);
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
                if self.stopping && self.draining.is_empty() {
                    return Flow::Stop;
                }
            }
            Command::Slowest { readers, reply } => {
                let cursors = readers
                    .into_iter()
                    .filter_map(|id| self.readers.get(&id).map(|slot| (id, slot.cursor)));
                let _ = reply.send(slowest(cursors));
            }
        }
        Flow::Continue
    }

    fn cancel(&mut self) -> Flow {
        if self.starving.is_empty() && self.draining.is_empty() {
            return Flow::Stop;
        }

        // Starving readers are exhausted by definition. Once read-only they
        // get end-of-stream on their next pull and unregister.
        self.read_only = true;
        self.stopping = true;
        self.draining.extend(self.starving.iter().copied());
        self.wake_starving();
        Flow::Continue
    }

    fn write_or_starve(&mut self, value: T, watched: Option<ReaderId>) -> bool {
        if self.read_only {
            return false;
        }

        let watched = watched.and_then(|id| self.readers.get(&id).map(|slot| slot.cursor));
        if let Some(cursor) = watched {
            if self.slots.would_overrun(cursor) {
                return false;
            }
            self.slots.write(value);
            debug_assert_watched_retained!(
                self.slots.lag(cursor),
                self.slots.capacity() as u64
            );
        } else {
            self.slots.write(value);
        }

        self.wake_starving();
        true
    }

    fn admit_readers(&mut self) {
        while let Ok(Registration { reader, wake }) = self.registrations.try_recv() {
            self.register(reader, wake);
        }
    }

    /// Adds a reader at the start of the stream.
    fn register(&mut self, reader: ReaderId, wake: Arc<Notify>) {
        self.readers.insert(
            reader,
            ReaderSlot {
                cursor: Cursor::default(),
                wake,
            },
        );
    }

    fn pull(&mut self, reader: ReaderId) -> PullReply<T> {
        let Some(slot) = self.readers.get_mut(&reader) else {
            return PullReply::EndOfStream;
        };

        if self.canceled.contains(&reader) {
            self.starving.remove(&reader);
            return PullReply::EndOfStream;
        }

        match self.slots.read(&mut slot.cursor) {
            ReadOutcome::Value { value, skipped } => {
                if skipped > 0 {
                    debug!(
                        ring = %self.ring,
                        reader = %reader,
                        skipped,
                        "reader lapped by writer, resynchronized to oldest retained value"
                    );
                }
                self.starving.remove(&reader);
                PullReply::Value {
                    value,
                    cursor: slot.cursor,
                }
            }
            ReadOutcome::Empty if !self.read_only => {
                self.starving.insert(reader);
                PullReply::Starving
            }
            ReadOutcome::Empty => {
                self.starving.remove(&reader);
                PullReply::EndOfStream
            }
        }
    }

    fn wake_starving(&mut self) {
        for reader in self.starving.drain() {
            if let Some(slot) = self.readers.get(&reader) {
                slot.wake.notify_one();
            }
        }
    }
}

/// Spawns a coordinator and returns the mailbox and liveness channels for it.
pub(crate) fn spawn<T: Clone + Send + 'static>(
    ring: RingId,
    capacity: usize,
    mailbox: usize,
) -> (
    mpsc::Sender<Command<T>>,
    mpsc::UnboundedSender<Registration>,
    watch::Receiver<bool>,
) {
    let (commands_tx, commands_rx) = mpsc::channel(mailbox);
    let (registrations_tx, registrations_rx) = mpsc::unbounded_channel();
    let (stopped_tx, stopped_rx) = watch::channel(false);
    let coordinator = Coordinator::new(ring, capacity, commands_rx, registrations_rx, stopped_tx);
    tokio::spawn(coordinator.run());
    (commands_tx, registrations_tx, stopped_rx)
}
