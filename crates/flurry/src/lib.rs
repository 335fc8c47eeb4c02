//! Snowflake-style 63-bit identifiers with a configurable bit layout.
//!
//! A [`BitLayout`] splits the 63 usable bits of an `i64` between a timestamp,
//! an optional clock sequence, a machine id and a per-tick sequence. A
//! [`Worker`] bound to one machine id hands out unique identifiers from any
//! number of threads, and [`extract_machine_id`] / [`decompose`] read them
//! back.
//!
//! ```
//! use std::{sync::Arc, thread};
//!
//! use flurry::{BitLayout, Worker};
//!
//! let layout = BitLayout::new(0, 41, 10, 12)?;
//! let worker = Arc::new(Worker::new(layout, 1)?);
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let worker = Arc::clone(&worker);
//!         thread::spawn(move || worker.generate_id())
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     assert!(handle.join().unwrap()? >= 0);
//! }
//! # Ok::<(), flurry::Error>(())
//! ```
//!
//! ## Feature flags
//!
//! - `parking-lot`: use `parking_lot::Mutex` (no lock poisoning)
//! - `cache-padded`: pad each worker's lock to a cache line
//! - `tracing`: emit `tracing` spans and events from the generation path
//! - `serde`: derive `Serialize`/`Deserialize` for [`BitLayout`], [`Parts`]
//!   and [`Policy`]

mod error;
mod extract;
mod generator;
mod layout;
mod rand;
mod time;

pub use crate::error::*;
pub use crate::extract::*;
pub use crate::generator::{Backoff, Policy, Worker};
pub use crate::layout::*;
pub use crate::rand::*;
pub use crate::time::*;
