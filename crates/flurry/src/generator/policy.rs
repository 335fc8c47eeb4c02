/// How a [`Worker`] moves its timestamp forward.
///
/// The two policies trade wall-clock fidelity against availability. A worker
/// is bound to exactly one of them for its whole lifetime.
///
/// [`Worker`]: crate::Worker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Policy {
    /// The clock is read once, when the worker is created. Afterwards the
    /// timestamp only advances when the sequence wraps.
    ///
    /// Generation never waits and never fails because of the clock, and
    /// identifiers are strictly increasing. Under sustained load the
    /// timestamp runs ahead of real time.
    #[default]
    LogicalTick,

    /// The clock is read on every call and the timestamp follows it.
    ///
    /// Exhausting a millisecond's sequence, or observing the clock step
    /// backwards, makes the call back off and retry (see [`Backoff`]).
    /// Rollbacks are absorbed by the clock-sequence field when the layout has
    /// one; otherwise a rollback that outlasts the retries is surfaced as
    /// [`Error::ClockRollback`].
    ///
    /// [`Backoff`]: crate::Backoff
    /// [`Error::ClockRollback`]: crate::Error::ClockRollback
    WallClock,
}
