//! Fan-in: many source readers forwarded into one shared ring.

use crate::config::DemuxConfig;
use crate::error::{ErrorReceiver, ErrorSink, MultiplexError};
use ringcast::{Reader, ReaderCanceller, Ring, RingError, RingId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

type OnCancel = Box<dyn FnOnce() + Send + 'static>;

/// A source reader waiting to be forwarded by a [`Demux`].
///
/// Once added, a forwarding task pulls from the reader and writes every value
/// into the demux's shared ring until the source reaches end-of-stream.
pub struct DemuxReader<T: Send + 'static> {
    reader: Reader<T>,
    handle: DemuxReaderHandle<T>,
    on_cancel: Option<OnCancel>,
}

impl<T: Clone + Send + 'static> DemuxReader<T> {
    pub fn new(reader: Reader<T>) -> Self {
        let handle = DemuxReaderHandle {
            source: reader.ring().id(),
            relaying: Arc::new(AtomicBool::new(true)),
            canceller: reader.canceller(),
        };
        Self {
            reader,
            handle,
            on_cancel: None,
        }
    }

    /// Registers a callback run once when the forwarding task exits,
    /// whichever way it ends.
    pub fn set_on_cancel<F>(&mut self, on_cancel: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_cancel = Some(Box::new(on_cancel));
    }

    /// Handle that removes or cancels this forwarding task after it has been
    /// handed to the demux.
    pub fn handle(&self) -> DemuxReaderHandle<T> {
        self.handle.clone()
    }

    /// The ring this reader forwards from.
    pub fn source(&self) -> RingId {
        self.handle.source
    }

    async fn forward(
        mut self,
        destination: Ring<T>,
        done: mpsc::WeakSender<DemuxCommand<T>>,
        errors: ErrorSink,
    ) {
        let source = self.handle.source;
        let mut forwarded = 0u64;

        // Keep pulling after relaying stops so the source reader reaches
        // end-of-stream and unregisters.
        while let Some(value) = self.reader.recv().await {
            if !self.handle.is_relaying() {
                continue;
            }
            match destination.write(value).await {
                Ok(()) => forwarded += 1,
                Err(error) => {
                    if self.handle.relaying.swap(false, Ordering::AcqRel) {
                        errors.report(MultiplexError::Ring {
                            ring: destination.id(),
                            source: error,
                        });
                    }
                }
            }
        }

        debug!(%source, forwarded, "forwarding task finished");

        // Deregister first so the source can be forwarded again as soon as
        // the callback has run.
        let on_cancel = self.on_cancel.take();
        if let Some(commands) = done.upgrade() {
            let _ = commands.send(DemuxCommand::Finished(self.handle)).await;
        }
        if let Some(on_cancel) = on_cancel {
            on_cancel();
        }
    }
}

impl<T: Send + 'static> fmt::Debug for DemuxReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemuxReader")
            .field("reader", &self.reader)
            .field("on_cancel", &self.on_cancel.is_some())
            .finish()
    }
}

/// Cloneable handle to a forwarding task.
pub struct DemuxReaderHandle<T> {
    source: RingId,
    relaying: Arc<AtomicBool>,
    canceller: ReaderCanceller<T>,
}

impl<T: Clone + Send + 'static> DemuxReaderHandle<T> {
    /// Stops relaying from the source.
    ///
    /// Values already handed to the shared ring stay there; the task cancels
    /// its source reader, discards anything still in flight and exits.
    pub fn cancel(&self) {
        self.relaying.store(false, Ordering::Release);
        // A stopped source ring ends the reader on its own.
        let _ = self.canceller.try_cancel();
    }
}

impl<T> DemuxReaderHandle<T> {
    /// The ring this task forwards from.
    pub fn source(&self) -> RingId {
        self.source
    }

    fn same_task(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.relaying, &other.relaying)
    }

    /// Returns `false` once the task was told to stop relaying.
    pub fn is_relaying(&self) -> bool {
        self.relaying.load(Ordering::Acquire)
    }
}

impl<T> Clone for DemuxReaderHandle<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source,
            relaying: Arc::clone(&self.relaying),
            canceller: self.canceller.clone(),
        }
    }
}

impl<T> fmt::Debug for DemuxReaderHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemuxReaderHandle")
            .field("source", &self.source)
            .field("relaying", &self.is_relaying())
            .finish()
    }
}

enum DemuxCommand<T: Send + 'static> {
    Add(DemuxReader<T>),
    Remove(DemuxReaderHandle<T>),
    Finished(DemuxReaderHandle<T>),
    Cancel,
}

impl<T: Send + 'static> DemuxCommand<T> {
    fn kind(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Remove(_) => "remove",
            Self::Finished(_) => "finished",
            Self::Cancel => "cancel",
        }
    }
}

/// Merges many source readers into one shared ring.
///
/// Each added [`DemuxReader`] gets its own forwarding task. Values from one
/// source keep their order in the shared ring; interleaving across sources is
/// unspecified. Cancelling the demux stops every forwarding task and cancels
/// the shared ring.
pub struct Demux<T: Send + 'static> {
    commands: mpsc::Sender<DemuxCommand<T>>,
    ring: Ring<T>,
    stopped: watch::Receiver<bool>,
}

impl<T: Clone + Send + 'static> Demux<T> {
    /// Creates the shared ring, spawns the dispatcher, and returns its handle
    /// together with the channel on which misuse is reported.
    pub fn new(config: DemuxConfig) -> Result<(Self, ErrorReceiver), RingError> {
        config.validate()?;

        let ring = Ring::new(config.ring)?;
        let (commands_tx, commands_rx) = mpsc::channel(config.mailbox);
        let (stopped_tx, stopped_rx) = watch::channel(false);
        let (errors, receiver) = ErrorSink::channel("demux");

        let dispatcher = Dispatcher {
            ring: ring.clone(),
            tasks: HashMap::new(),
            commands: commands_rx,
            done: commands_tx.downgrade(),
            errors,
            stopped: stopped_tx,
        };
        tokio::spawn(dispatcher.run());

        Ok((
            Self {
                commands: commands_tx,
                ring,
                stopped: stopped_rx,
            },
            receiver,
        ))
    }

    /// Starts forwarding from `reader`.
    ///
    /// Sources are identified by their ring, not by reader: if the reader's
    /// ring is already being forwarded, even through a different reader, the
    /// new reader is dropped unused and [`MultiplexError::DuplicateSource`] is
    /// reported.
    pub async fn add(&self, reader: DemuxReader<T>) -> Result<(), MultiplexError> {
        self.send(DemuxCommand::Add(reader)).await
    }

    /// Stops the forwarding task behind `handle` and forgets it. Removing a
    /// task that is not registered is reported as
    /// [`MultiplexError::UnknownSource`].
    pub async fn remove(&self, handle: &DemuxReaderHandle<T>) -> Result<(), MultiplexError> {
        self.send(DemuxCommand::Remove(handle.clone())).await
    }

    /// Stops the dispatcher, every forwarding task and the shared ring.
    /// Cancelling a stopped demux is a no-op.
    pub async fn cancel(&self) -> Result<(), MultiplexError> {
        match self.send(DemuxCommand::Cancel).await {
            Err(MultiplexError::Stopped) => Ok(()),
            other => other,
        }
    }

    /// Creates a reader over the shared ring.
    pub fn reader(&self) -> Reader<T> {
        self.ring.reader()
    }

    async fn send(&self, command: DemuxCommand<T>) -> Result<(), MultiplexError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| MultiplexError::Stopped)
    }
}

impl<T: Send + 'static> Demux<T> {
    /// The shared destination ring.
    pub fn ring(&self) -> &Ring<T> {
        &self.ring
    }

    /// Returns `true` once the dispatcher has exited.
    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Resolves once the dispatcher has exited.
    pub async fn stopped(&self) {
        let mut stopped = self.stopped.clone();
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }
}

impl<T: Send + 'static> Clone for Demux<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            ring: self.ring.clone(),
            stopped: self.stopped.clone(),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Demux<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Demux")
            .field("ring", &self.ring)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

struct Dispatcher<T: Send + 'static> {
    ring: Ring<T>,
    tasks: HashMap<RingId, DemuxReaderHandle<T>>,
    commands: mpsc::Receiver<DemuxCommand<T>>,
    done: mpsc::WeakSender<DemuxCommand<T>>,
    errors: ErrorSink,
    stopped: watch::Sender<bool>,
}

impl<T: Clone + Send + 'static> Dispatcher<T> {
    async fn run(mut self) {
        debug!(ring = %self.ring.id(), "demux started");

        // Ends on an explicit cancel or once every handle is dropped.
        while let Some(command) = self.commands.recv().await {
            trace!(command = command.kind(), tasks = self.tasks.len(), "demux dispatch");
            match command {
                DemuxCommand::Add(reader) => self.add(reader),
                DemuxCommand::Remove(handle) => self.remove(&handle),
                DemuxCommand::Finished(handle) => self.finished(&handle),
                DemuxCommand::Cancel => break,
            }
        }

        self.commands.close();
        for handle in self.tasks.values() {
            handle.cancel();
        }
        // Ignored: the ring may already be stopped by its own cancel.
        let _ = self.ring.cancel().await;

        debug!(ring = %self.ring.id(), tasks = self.tasks.len(), "demux stopped");
        self.stopped.send_replace(true);
    }

    fn add(&mut self, reader: DemuxReader<T>) {
        let source = reader.source();
        if self.tasks.contains_key(&source) {
            self.errors
                .report(MultiplexError::DuplicateSource { ring: source });
            return;
        }

        self.tasks.insert(source, reader.handle());
        tokio::spawn(reader.forward(
            self.ring.clone(),
            self.done.clone(),
            self.errors.clone(),
        ));
    }

    fn is_registered(&self, handle: &DemuxReaderHandle<T>) -> bool {
        self.tasks
            .get(&handle.source)
            .is_some_and(|registered| registered.same_task(handle))
    }

    /// Forgets a task that ended on its own, unless its source has already
    /// been handed to a newer task.
    fn finished(&mut self, handle: &DemuxReaderHandle<T>) {
        if self.is_registered(handle) {
            self.tasks.remove(&handle.source);
        }
    }

    fn remove(&mut self, handle: &DemuxReaderHandle<T>) {
        if self.is_registered(handle) {
            self.tasks.remove(&handle.source);
            handle.cancel();
        } else {
            self.errors.report(MultiplexError::UnknownSource {
                ring: handle.source,
            });
        }
    }
}
