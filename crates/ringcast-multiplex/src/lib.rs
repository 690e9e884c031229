//! Fan-out and Fan-in Combinators for ringcast
//!
//! [`Mux`] takes one stream of writes and broadcasts every value into each
//! registered [`Ring`](ringcast::Ring). [`Demux`] does the opposite: it
//! forwards many source readers into one shared ring that any number of
//! readers can consume.
//!
//! # Features
//!
//! - **One dispatcher task per combinator**: adds, removes and writes are
//!   applied in the order they were issued
//! - **Advisory errors**: duplicate or unknown registrations are reported on
//!   an error channel and logged; the dispatcher keeps running
//! - **Independent forwarding**: each demux source has its own task and can be
//!   removed or canceled without touching the others
//!
//! # Example
//!
//! ```
//! use ringcast::Ring;
//! use ringcast_multiplex::{Demux, DemuxConfig, DemuxReader, Mux, MuxConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mux, _errors) = Mux::new(MuxConfig::default())?;
//!     let (demux, _errors) = Demux::new(DemuxConfig::default())?;
//!
//!     // Two rings fed by the mux, both forwarded into the demux.
//!     let left = Ring::<u32>::with_capacity(16)?;
//!     let right = Ring::<u32>::with_capacity(16)?;
//!     for ring in [&left, &right] {
//!         mux.add(ring.clone()).await?;
//!         demux.add(DemuxReader::new(ring.reader())).await?;
//!     }
//!
//!     mux.write(7).await?;
//!     mux.cancel().await?;
//!     mux.stopped().await;
//!
//!     let mut merged = demux.reader();
//!     assert_eq!(merged.recv().await, Some(7));
//!     assert_eq!(merged.recv().await, Some(7));
//!
//!     left.end_of_writes().await?;
//!     right.end_of_writes().await?;
//!     demux.cancel().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod demux;
mod error;
mod mux;

pub use config::{DemuxConfig, MuxConfig};
pub use demux::{Demux, DemuxReader, DemuxReaderHandle};
pub use error::{ErrorReceiver, MultiplexError};
pub use mux::{Mux, MuxState};
