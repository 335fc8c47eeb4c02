use crate::{
    Error, Result,
    layout::{BitLayout, bit_layout::max_value},
};

/// Position and size of one identifier field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Field {
    bits: u8,
    offset: u8,
    max: i64,
}

impl Field {
    const fn new(bits: u8, offset: u8) -> Self {
        Self {
            bits,
            offset,
            max: max_value(bits),
        }
    }

    pub const fn bits(&self) -> u8 {
        self.bits
    }

    /// Number of less significant bits below this field.
    pub const fn offset(&self) -> u8 {
        self.offset
    }

    /// Largest value the field can hold, `(1 << bits) - 1`.
    pub const fn max(&self) -> i64 {
        self.max
    }

    /// The field's bits in place within an identifier.
    pub const fn mask(&self) -> i64 {
        self.max << self.offset
    }

    /// Returns `true` if `value` fits in this field.
    pub const fn contains(&self, value: i64) -> bool {
        0 <= value && value <= self.max
    }

    /// Reads this field out of `id`.
    pub const fn extract(&self, id: i64) -> i64 {
        (id & self.mask()) >> self.offset
    }

    const fn place(&self, value: i64) -> i64 {
        value << self.offset
    }
}

/// The decoded fields of an identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Parts {
    /// Milliseconds (or logical ticks) since the layout's epoch.
    pub timestamp: i64,
    pub clock_sequence: i64,
    pub machine_id: i64,
    pub sequence: i64,
}

impl Parts {
    /// Converts the timestamp field back into milliseconds since the Unix
    /// epoch.
    ///
    /// For workers running [`Policy::LogicalTick`] this is the wall-clock time
    /// the worker was created plus the ticks it has advanced since, which
    /// runs ahead of real time under sustained load.
    ///
    /// [`Policy::LogicalTick`]: crate::Policy::LogicalTick
    pub const fn unix_millis(&self, layout: &BitLayout) -> i64 {
        layout.start_epoch_millis().saturating_add(self.timestamp)
    }
}

/// Precomputed field offsets and maxima of a valid [`BitLayout`].
///
/// Obtained from [`BitLayout::packing`]. Workers compute it once at
/// construction so the hot path never re-derives shifts or masks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Packing {
    timestamp: Field,
    clock_sequence: Field,
    machine_id: Field,
    sequence: Field,
}

impl Packing {
    pub(crate) const fn new(layout: &BitLayout) -> Self {
        let sequence = Field::new(layout.sequence_bits(), 0);
        let machine_id = Field::new(layout.machine_id_bits(), sequence.bits);
        let clock_sequence = Field::new(
            layout.clock_sequence_bits(),
            machine_id.offset + machine_id.bits,
        );
        let timestamp = Field::new(
            layout.timestamp_bits(),
            clock_sequence.offset + clock_sequence.bits,
        );
        Self {
            timestamp,
            clock_sequence,
            machine_id,
            sequence,
        }
    }

    pub const fn timestamp(&self) -> Field {
        self.timestamp
    }

    pub const fn clock_sequence(&self) -> Field {
        self.clock_sequence
    }

    pub const fn machine_id(&self) -> Field {
        self.machine_id
    }

    pub const fn sequence(&self) -> Field {
        self.sequence
    }

    /// Verifies that every field of `parts` fits its slot.
    ///
    /// # Errors
    ///
    /// Returns the `*Illegal` error of the first field (most significant
    /// first) that is out of range.
    pub fn check(&self, parts: &Parts) -> Result<()> {
        if !self.timestamp.contains(parts.timestamp) {
            return Err(Error::TimestampIllegal {
                timestamp: parts.timestamp,
                max: self.timestamp.max,
            });
        }
        if !self.clock_sequence.contains(parts.clock_sequence) {
            return Err(Error::ClockSequenceIllegal {
                clock_sequence: parts.clock_sequence,
                max: self.clock_sequence.max,
            });
        }
        if !self.machine_id.contains(parts.machine_id) {
            return Err(Error::MachineIdIllegal {
                machine_id: parts.machine_id,
                max: self.machine_id.max,
            });
        }
        if !self.sequence.contains(parts.sequence) {
            return Err(Error::SeqIllegal {
                sequence: parts.sequence,
                max: self.sequence.max,
            });
        }
        Ok(())
    }

    /// Checks `parts` and packs them into an identifier.
    ///
    /// # Errors
    ///
    /// See [`Packing::check`].
    pub fn pack(&self, parts: &Parts) -> Result<i64> {
        self.check(parts)?;
        Ok(self.timestamp.place(parts.timestamp)
            | self.clock_sequence.place(parts.clock_sequence)
            | self.machine_id.place(parts.machine_id)
            | self.sequence.place(parts.sequence))
    }

    /// Splits an identifier back into its fields.
    ///
    /// The sign bit is ignored.
    pub const fn unpack(&self, id: i64) -> Parts {
        Parts {
            timestamp: self.timestamp.extract(id),
            clock_sequence: self.clock_sequence.extract(id),
            machine_id: self.machine_id.extract(id),
            sequence: self.sequence.extract(id),
        }
    }
}
