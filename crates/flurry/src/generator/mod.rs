mod backoff;
mod policy;
#[cfg(test)]
mod tests;
mod worker;

pub use backoff::*;
pub use policy::*;
pub use worker::*;

// `parking_lot` mutexes never poison; the std ones surface
// `Error::LockPoisoned`.
#[cfg(feature = "parking-lot")]
pub(crate) use parking_lot::{Mutex, MutexGuard};
#[cfg(not(feature = "parking-lot"))]
pub(crate) use std::sync::{Mutex, MutexGuard, PoisonError};
