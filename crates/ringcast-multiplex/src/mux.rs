//! Fan-out: one writer broadcasting into many rings.

use crate::config::MuxConfig;
use crate::error::{ErrorReceiver, ErrorSink, MultiplexError};
use ringcast::{Ring, RingError};
use std::fmt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

/// Lifecycle of a mux dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxState {
    /// Created, dispatcher not yet scheduled.
    Idle,
    /// Accepting adds, removes and writes.
    Running,
    /// Canceled or abandoned; every further command fails.
    Stopped,
}

enum MuxCommand<T> {
    Add(Ring<T>),
    Remove(Ring<T>),
    Write(T),
    Cancel,
}

impl<T> MuxCommand<T> {
    fn kind(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Remove(_) => "remove",
            Self::Write(_) => "write",
            Self::Cancel => "cancel",
        }
    }
}

/// Broadcasts every written value to each registered ring.
///
/// Commands and writes share one mailbox, so a write is delivered to exactly
/// the rings registered before it was issued. The mux never cancels the
/// rings it writes to; their lifecycle stays with the caller.
pub struct Mux<T> {
    commands: mpsc::Sender<MuxCommand<T>>,
    state: watch::Receiver<MuxState>,
}

impl<T: Clone + Send + 'static> Mux<T> {
    /// Spawns the dispatcher and returns its handle together with the channel
    /// on which misuse (duplicate add, unknown remove) and failed writes are
    /// reported.
    pub fn new(config: MuxConfig) -> Result<(Self, ErrorReceiver), RingError> {
        config.validate()?;

        let (commands_tx, commands_rx) = mpsc::channel(config.mailbox);
        let (state_tx, state_rx) = watch::channel(MuxState::Idle);
        let (errors, receiver) = ErrorSink::channel("mux");

        let dispatcher = Dispatcher {
            rings: Vec::new(),
            commands: commands_rx,
            errors,
            state: state_tx,
        };
        tokio::spawn(dispatcher.run());

        Ok((
            Self {
                commands: commands_tx,
                state: state_rx,
            },
            receiver,
        ))
    }

    /// Starts broadcasting to `ring`. Adding a ring twice is reported as
    /// [`MultiplexError::DuplicateRing`].
    pub async fn add(&self, ring: Ring<T>) -> Result<(), MultiplexError> {
        self.send(MuxCommand::Add(ring)).await
    }

    /// Stops broadcasting to `ring`. Removing an unknown ring is reported as
    /// [`MultiplexError::UnknownRing`].
    pub async fn remove(&self, ring: &Ring<T>) -> Result<(), MultiplexError> {
        self.send(MuxCommand::Remove(ring.clone())).await
    }

    /// Writes `value` into every registered ring.
    pub async fn write(&self, value: T) -> Result<(), MultiplexError> {
        self.send(MuxCommand::Write(value)).await
    }

    /// Stops the dispatcher once the commands queued before it are applied.
    /// Cancelling a stopped mux is a no-op.
    pub async fn cancel(&self) -> Result<(), MultiplexError> {
        match self.send(MuxCommand::Cancel).await {
            Err(MultiplexError::Stopped) => Ok(()),
            other => other,
        }
    }

    async fn send(&self, command: MuxCommand<T>) -> Result<(), MultiplexError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| MultiplexError::Stopped)
    }
}

impl<T> Mux<T> {
    pub fn state(&self) -> MuxState {
        *self.state.borrow()
    }

    /// Resolves once the dispatcher has exited.
    pub async fn stopped(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|state| *state == MuxState::Stopped).await;
    }
}

impl<T> Clone for Mux<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> fmt::Debug for Mux<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mux").field("state", &self.state()).finish()
    }
}

struct Dispatcher<T> {
    rings: Vec<Ring<T>>,
    commands: mpsc::Receiver<MuxCommand<T>>,
    errors: ErrorSink,
    state: watch::Sender<MuxState>,
}

impl<T: Clone + Send + 'static> Dispatcher<T> {
    async fn run(mut self) {
        self.state.send_replace(MuxState::Running);
        debug!("mux started");

        while let Some(command) = self.commands.recv().await {
            trace!(command = command.kind(), rings = self.rings.len(), "mux dispatch");
            match command {
                MuxCommand::Add(ring) => self.add(ring),
                MuxCommand::Remove(ring) => self.remove(&ring),
                MuxCommand::Write(value) => self.broadcast(value).await,
                MuxCommand::Cancel => break,
            }
        }

        self.commands.close();
        debug!(rings = self.rings.len(), "mux stopped");
        self.state.send_replace(MuxState::Stopped);
    }

    fn add(&mut self, ring: Ring<T>) {
        if self.rings.contains(&ring) {
            self.errors
                .report(MultiplexError::DuplicateRing { ring: ring.id() });
        } else {
            self.rings.push(ring);
        }
    }

    fn remove(&mut self, ring: &Ring<T>) {
        match self.rings.iter().position(|r| r == ring) {
            Some(index) => {
                self.rings.swap_remove(index);
            }
            None => self
                .errors
                .report(MultiplexError::UnknownRing { ring: ring.id() }),
        }
    }

    async fn broadcast(&self, value: T) {
        for ring in &self.rings {
            if let Err(source) = ring.write(value.clone()).await {
                self.errors.report(MultiplexError::Ring {
                    ring: ring.id(),
                    source,
                });
            }
        }
    }
}
