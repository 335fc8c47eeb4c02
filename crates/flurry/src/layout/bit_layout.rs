use core::time::Duration;
use std::time::SystemTime;

use crate::{
    Error, Result,
    layout::Packing,
    time::{duration_millis, unix_millis},
};

/// Number of bits available to an identifier. The 64th (sign) bit is never
/// used, so every identifier is a non-negative `i64`.
pub const LAYOUT_BITS: u8 = 63;

/// Describes how the 63 usable bits of an identifier are split between its
/// fields, and which instant counts as timestamp zero.
///
/// From most to least significant bit:
///
/// ```text
///  Bit Index:  63   62 ..................................................... 0
///              +---+-----------+----------------+--------------+-----------+
///  Field:      | 0 | timestamp | clock sequence |  machine id  | sequence  |
///              +---+-----------+----------------+--------------+-----------+
/// ```
///
/// The clock-sequence field is optional (zero bits by default). It only
/// matters to workers running [`Policy::WallClock`], which bump it to keep
/// identifiers issued after a clock rollback apart from earlier ones.
///
/// A layout is only accepted when its four widths add up to exactly
/// [`LAYOUT_BITS`]. Workers and the extraction helpers re-check this, so a
/// layout that was mutated or deserialized into an invalid state is rejected
/// before it can produce an identifier.
///
/// # Example
///
/// ```
/// use flurry::{BitLayout, TWITTER_EPOCH};
///
/// let mut layout = BitLayout::new(0, 41, 10, 12).unwrap();
/// layout.set_epoch(TWITTER_EPOCH);
/// assert_eq!(layout.max_machine_id(), 1023);
///
/// assert!(BitLayout::new(0, 40, 10, 12).is_err());
/// ```
///
/// [`Policy::WallClock`]: crate::Policy::WallClock
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BitLayout {
    start_epoch_millis: i64,
    timestamp_bits: u8,
    clock_sequence_bits: u8,
    machine_id_bits: u8,
    sequence_bits: u8,
}

impl Default for BitLayout {
    /// The classic Snowflake split on the Unix epoch: 41 bits of timestamp, 10
    /// bits of machine id and 12 bits of sequence.
    fn default() -> Self {
        Self {
            start_epoch_millis: 0,
            timestamp_bits: 41,
            clock_sequence_bits: 0,
            machine_id_bits: 10,
            sequence_bits: 12,
        }
    }
}

impl BitLayout {
    /// Creates a layout without a clock-sequence field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BitsSum`] unless the widths add up to 63.
    pub fn new(
        start_epoch_millis: i64,
        timestamp_bits: u8,
        machine_id_bits: u8,
        sequence_bits: u8,
    ) -> Result<Self> {
        Self::with_clock_sequence(
            start_epoch_millis,
            timestamp_bits,
            0,
            machine_id_bits,
            sequence_bits,
        )
    }

    /// Creates a layout that reserves `clock_sequence_bits` for rollback
    /// disambiguation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BitsSum`] unless the widths add up to 63.
    pub fn with_clock_sequence(
        start_epoch_millis: i64,
        timestamp_bits: u8,
        clock_sequence_bits: u8,
        machine_id_bits: u8,
        sequence_bits: u8,
    ) -> Result<Self> {
        let layout = Self {
            start_epoch_millis,
            timestamp_bits,
            clock_sequence_bits,
            machine_id_bits,
            sequence_bits,
        };
        layout.validate()?;
        Ok(layout)
    }

    #[cfg(test)]
    pub(crate) const fn new_unchecked(
        start_epoch_millis: i64,
        timestamp_bits: u8,
        clock_sequence_bits: u8,
        machine_id_bits: u8,
        sequence_bits: u8,
    ) -> Self {
        Self {
            start_epoch_millis,
            timestamp_bits,
            clock_sequence_bits,
            machine_id_bits,
            sequence_bits,
        }
    }

    /// Checks that the field widths add up to exactly 63 bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BitsSum`] carrying the actual sum otherwise.
    pub fn validate(&self) -> Result<()> {
        let sum = self.bits_sum();
        if sum == u16::from(LAYOUT_BITS) {
            Ok(())
        } else {
            Err(Error::BitsSum { sum })
        }
    }

    /// Computes the offsets and maxima of every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BitsSum`] if the layout is invalid.
    pub fn packing(&self) -> Result<Packing> {
        self.validate()?;
        Ok(Packing::new(self))
    }

    /// Moves timestamp zero to `at`.
    ///
    /// Workers copy the layout when they are built, so this only affects
    /// workers created afterwards.
    pub fn set_start_time(&mut self, at: SystemTime) {
        self.start_epoch_millis = unix_millis(at);
    }

    /// Moves timestamp zero to `epoch`, given as the time elapsed since the
    /// Unix epoch (e.g. [`TWITTER_EPOCH`]).
    ///
    /// [`TWITTER_EPOCH`]: crate::TWITTER_EPOCH
    pub fn set_epoch(&mut self, epoch: Duration) {
        self.start_epoch_millis = duration_millis(epoch);
    }

    /// Milliseconds since the Unix epoch that map to timestamp zero.
    pub const fn start_epoch_millis(&self) -> i64 {
        self.start_epoch_millis
    }

    pub const fn timestamp_bits(&self) -> u8 {
        self.timestamp_bits
    }

    pub const fn clock_sequence_bits(&self) -> u8 {
        self.clock_sequence_bits
    }

    pub const fn machine_id_bits(&self) -> u8 {
        self.machine_id_bits
    }

    pub const fn sequence_bits(&self) -> u8 {
        self.sequence_bits
    }

    /// Largest machine id this layout can encode.
    ///
    /// Only meaningful for a valid layout.
    pub const fn max_machine_id(&self) -> i64 {
        max_value(self.machine_id_bits)
    }

    const fn bits_sum(&self) -> u16 {
        self.timestamp_bits as u16
            + self.clock_sequence_bits as u16
            + self.machine_id_bits as u16
            + self.sequence_bits as u16
    }
}

/// `(1 << bits) - 1` without overflowing at 63 bits.
pub(crate) const fn max_value(bits: u8) -> i64 {
    if bits == 0 {
        0
    } else if bits >= LAYOUT_BITS {
        i64::MAX
    } else {
        i64::MAX >> (LAYOUT_BITS - bits)
    }
}
