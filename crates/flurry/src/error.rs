use thiserror::Error;

/// A result type defaulting to this crate's [`enum@Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `flurry` can emit.
///
/// Construction errors ([`Error::BitsSum`], [`Error::MachineIdIllegal`]) are
/// returned before any worker exists. The `*Illegal` variants returned from
/// generation are defensive: they indicate a broken layout or an exhausted
/// timestamp range, never a transient condition.
///
/// [`Error::ClockRollback`] and [`Error::SequenceExhausted`] are only produced
/// by the wall-clock policy and are absorbed by the worker's retry loop before
/// they reach the caller. See [`Error::is_retryable`].
#[derive(Clone, Debug, Error, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Error {
    /// The configured field widths do not add up to 63 bits.
    #[error("the sum of bits is {sum}, must be 63")]
    BitsSum {
        /// The actual sum of the four field widths.
        sum: u16,
    },

    /// The machine id does not fit in the layout's machine-id field.
    #[error("machine id {machine_id} is illegal, must be within [0, {max}]")]
    MachineIdIllegal {
        /// The rejected machine id.
        machine_id: i64,
        /// Largest machine id the layout can encode.
        max: i64,
    },

    /// The worker's timestamp is outside the timestamp field.
    ///
    /// Happens when the configured epoch lies in the future, or once the
    /// timestamp field has been used up.
    #[error("timestamp {timestamp} is illegal, must be within [0, {max}]")]
    TimestampIllegal {
        /// The offending timestamp, relative to the layout's epoch.
        timestamp: i64,
        /// Largest timestamp the layout can encode.
        max: i64,
    },

    /// The worker's clock sequence is outside the clock-sequence field.
    #[error("clock sequence {clock_sequence} is illegal, must be within [0, {max}]")]
    ClockSequenceIllegal {
        /// The offending clock sequence.
        clock_sequence: i64,
        /// Largest clock sequence the layout can encode.
        max: i64,
    },

    /// The worker's sequence is outside the sequence field.
    #[error("sequence {sequence} is illegal, must be within [0, {max}]")]
    SeqIllegal {
        /// The offending sequence.
        sequence: i64,
        /// Largest sequence the layout can encode.
        max: i64,
    },

    /// The wall clock moved backwards and the clock sequence could not absorb
    /// it.
    #[error("clock moved backwards: now {now}, last {last}")]
    ClockRollback {
        /// The observed time, relative to the layout's epoch.
        now: i64,
        /// The timestamp of the last issued identifier.
        last: i64,
    },

    /// Every sequence value of the current millisecond has been issued.
    #[error("sequence exhausted for timestamp {timestamp}")]
    SequenceExhausted {
        /// The exhausted tick, relative to the layout's epoch.
        timestamp: i64,
    },

    /// The worker's lock was poisoned by a panicking thread.
    ///
    /// `parking_lot` mutexes do not poison, so this variant does not exist
    /// with the `parking-lot` feature.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Returns `true` for errors that may clear up by waiting and trying again.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ClockRollback { .. } | Self::SequenceExhausted { .. }
        )
    }
}

#[cfg(not(feature = "parking-lot"))]
use crate::generator::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}
