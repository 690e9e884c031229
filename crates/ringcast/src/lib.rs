//! RingCast - Single-Writer, Multi-Reader Broadcast Ring Buffer
//!
//! One producer publishes a stream of values into a fixed-size circular
//! buffer; any number of readers consume it independently, each at its own
//! pace. The writer never waits for readers and readers never wait for each
//! other. Memory stays bounded: a reader that falls more than one full lap
//! behind is moved forward to the oldest value still retained and silently
//! loses what it missed.
//!
//! # Key Features
//!
//! - Single-owner coordinator task per ring (no locks around the buffer)
//! - Per-reader cursors with lag resynchronization
//! - Starvation handshake: caught-up readers park until the next write
//! - Optional backpressure via [`Ring::write_or_starve`] and
//!   [`Ring::slowest_reader`]
//! - Graceful end-of-writes drain and terminal cancel
//! - Byte-stream adapters ([`ByteWriter`], [`ByteReader`])
//!
//! # Example
//!
//! ```
//! use ringcast::{Ring, RingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ringcast::RingError> {
//!     let ring = Ring::<u64>::new(RingConfig::default().with_capacity(16))?;
//!
//!     // Every reader sees the stream from the first value written.
//!     let mut fast = ring.reader();
//!     let mut slow = ring.reader();
//!
//!     for i in 0..4 {
//!         ring.write(i).await?;
//!     }
//!     ring.end_of_writes().await?;
//!
//!     while let Some(item) = fast.recv().await {
//!         println!("fast: {}", item);
//!     }
//!     assert_eq!(slow.recv().await, Some(0));
//!
//!     ring.cancel().await?;
//!     Ok(())
//! }
//! ```

mod byte_stream;
mod command;
mod config;
mod coordinator;
mod cursor;
mod error;
mod invariants;
mod reader;
mod ring;

pub use byte_stream::{ByteReader, ByteWriter};
pub use command::ReadStatus;
pub use config::{ReaderOptions, RingConfig, DEFAULT_CAPACITY, DEFAULT_MAILBOX};
pub use cursor::{slowest, Cursor};
pub use error::{ByteStreamError, RingError};
pub use reader::{Reader, ReaderCanceller, ReaderId, ReaderStream};
pub use ring::{Ring, RingId};

// Re-export useful stream combinators
pub use tokio_stream::StreamExt;
