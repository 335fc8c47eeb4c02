use core::cmp::Ordering;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Result,
    generator::{Backoff, Mutex, MutexGuard, Policy},
    layout::{BitLayout, Packing, Parts},
    rand::{RandSource, ThreadRandom},
    time::{SystemClock, TimeSource},
};

/// Mutable part of a worker. Only ever touched under the worker's lock.
#[derive(Debug)]
struct State {
    /// Relative to the layout's epoch.
    timestamp: i64,
    clock_sequence: i64,
    sequence: i64,
    /// Whether `sequence` has already been issued for `timestamp`. Only the
    /// wall-clock policy needs it; the logical tick policy always points at
    /// the next unissued slot.
    claimed: bool,
}

/// A Snowflake identifier generator bound to one machine id and one layout.
///
/// All state sits behind a single mutex, so one worker can be shared (e.g.
/// through an [`Arc`]) by any number of threads. Every call packs a distinct
/// `(timestamp, clock sequence, sequence)` triple, and because the machine id
/// occupies its own bits, workers with different machine ids under the same
/// layout can never collide.
///
/// The timestamp baseline is taken from the time source once, when the worker
/// is created. How it advances afterwards depends on the worker's [`Policy`].
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Any [`BitLayout`], including a clock-sequence field
/// - ✅ Pluggable [`TimeSource`] and [`RandSource`]
///
/// # Example
///
/// ```
/// use flurry::{BitLayout, Worker, extract_machine_id};
///
/// let layout = BitLayout::new(0, 41, 10, 12).unwrap();
/// let worker = Worker::new(layout, 5).unwrap();
///
/// let a = worker.generate_id().unwrap();
/// let b = worker.generate_id().unwrap();
/// assert!(a < b);
/// assert_eq!(extract_machine_id(&layout, a).unwrap(), 5);
/// ```
///
/// [`Arc`]: std::sync::Arc
#[derive(Debug)]
pub struct Worker<T = SystemClock, R = ThreadRandom>
where
    T: TimeSource<i64>,
    R: RandSource<u64>,
{
    layout: BitLayout,
    packing: Packing,
    machine_id: i64,
    policy: Policy,
    backoff: Backoff,
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<State>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<State>,
    time: T,
    rand: R,
}

impl Worker {
    /// Creates a worker using the [`Policy::LogicalTick`] policy and the
    /// system clock.
    ///
    /// # Errors
    ///
    /// - [`Error::BitsSum`] if `layout` is invalid
    /// - [`Error::MachineIdIllegal`] if `machine_id` is negative or does not
    ///   fit the layout's machine-id field
    pub fn new(layout: BitLayout, machine_id: i64) -> Result<Self> {
        Self::with_sources(
            layout,
            machine_id,
            Policy::LogicalTick,
            SystemClock,
            ThreadRandom,
        )
    }

    /// Creates a worker using the [`Policy::WallClock`] policy and the system
    /// clock, retrying with the default [`Backoff`].
    ///
    /// # Errors
    ///
    /// Same as [`Worker::new`].
    pub fn wall_clock(layout: BitLayout, machine_id: i64) -> Result<Self> {
        Self::with_sources(
            layout,
            machine_id,
            Policy::WallClock,
            SystemClock,
            ThreadRandom,
        )
    }
}

impl<T, R> Worker<T, R>
where
    T: TimeSource<i64>,
    R: RandSource<u64>,
{
    /// Creates a worker from explicit parts.
    ///
    /// This is the constructor behind [`Worker::new`] and
    /// [`Worker::wall_clock`]; use it to plug in a different clock (e.g.
    /// [`MonotonicClock`]) or a deterministic time source in tests.
    ///
    /// `time` is read here to set the timestamp baseline.
    ///
    /// # Errors
    ///
    /// Same as [`Worker::new`].
    ///
    /// [`MonotonicClock`]: crate::MonotonicClock
    pub fn with_sources(
        layout: BitLayout,
        machine_id: i64,
        policy: Policy,
        time: T,
        rand: R,
    ) -> Result<Self> {
        let packing = layout.packing()?;
        let max = packing.machine_id().max();
        if !packing.machine_id().contains(machine_id) {
            return Err(Error::MachineIdIllegal { machine_id, max });
        }

        let state = State {
            timestamp: time
                .current_millis()
                .saturating_sub(layout.start_epoch_millis()),
            clock_sequence: 0,
            sequence: 0,
            claimed: false,
        };

        Ok(Self {
            layout,
            packing,
            machine_id,
            policy,
            backoff: Backoff::default(),
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(Mutex::new(state)),
            #[cfg(not(feature = "cache-padded"))]
            state: Mutex::new(state),
            time,
            rand,
        })
    }

    /// Replaces the retry policy used by [`Policy::WallClock`] workers.
    ///
    /// Has no effect on [`Policy::LogicalTick`] workers, which never retry.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn machine_id(&self) -> i64 {
        self.machine_id
    }

    /// The layout this worker was created with.
    pub fn layout(&self) -> &BitLayout {
        &self.layout
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Generates the next identifier.
    ///
    /// With [`Policy::LogicalTick`] this makes exactly one attempt and never
    /// waits. With [`Policy::WallClock`], retryable failures (see
    /// [`Error::is_retryable`]) are retried according to the worker's
    /// [`Backoff`] before the final attempt's result is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::TimestampIllegal`] if the timestamp left its field, e.g.
    ///   because the layout's epoch lies in the future or the field is used
    ///   up
    /// - [`Error::ClockSequenceIllegal`] / [`Error::SeqIllegal`] if the state
    ///   is out of range (never expected)
    /// - [`Error::ClockRollback`] / [`Error::SequenceExhausted`] if every
    ///   attempt of a wall-clock worker failed
    /// - [`Error::LockPoisoned`] if another thread panicked while generating
    ///   (not with the `parking-lot` feature)
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self), fields(machine_id = self.machine_id)))]
    pub fn generate_id(&self) -> Result<i64> {
        if self.policy == Policy::LogicalTick {
            return self.try_generate_id();
        }

        for _attempt in 0..self.backoff.retries {
            match self.try_generate_id() {
                Err(e) if e.is_retryable() => {
                    let delay = self.backoff.delay(&self.rand);
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt = _attempt, ?delay, error = %e, "backing off");
                    std::thread::sleep(delay);
                }
                res => return res,
            }
        }
        self.try_generate_id()
    }

    /// Makes a single generation attempt, without retrying.
    ///
    /// # Errors
    ///
    /// Same as [`Worker::generate_id`], except that retryable errors are
    /// returned right away.
    pub fn try_generate_id(&self) -> Result<i64> {
        let mut state = self.lock()?;
        match self.policy {
            Policy::LogicalTick => self.next_logical(&mut state),
            Policy::WallClock => {
                // Read under the lock so callers observe a non-decreasing
                // clock in lock order.
                let now = self
                    .time
                    .current_millis()
                    .saturating_sub(self.layout.start_epoch_millis());
                self.next_wall_clock(now, &mut state)
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        #[cfg(feature = "parking-lot")]
        {
            Ok(self.state.lock())
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            Ok(self.state.lock()?)
        }
    }

    /// Issues the current slot, then moves to the next one. A full sequence
    /// advances the timestamp by one tick instead of waiting for the clock.
    fn next_logical(&self, state: &mut State) -> Result<i64> {
        let id = self.pack(state)?;
        if state.sequence == self.packing.sequence().max() {
            state.timestamp =
                state
                    .timestamp
                    .checked_add(1)
                    .ok_or(Error::TimestampIllegal {
                        timestamp: state.timestamp,
                        max: self.packing.timestamp().max(),
                    })?;
            state.sequence = 0;
        } else {
            state.sequence += 1;
        }
        Ok(id)
    }

    fn next_wall_clock(&self, now: i64, state: &mut State) -> Result<i64> {
        match now.cmp(&state.timestamp) {
            Ordering::Greater => {
                state.timestamp = now;
                state.sequence = 0;
            }
            Ordering::Equal => {
                if state.claimed {
                    if state.sequence >= self.packing.sequence().max() {
                        return Err(Error::SequenceExhausted { timestamp: now });
                    }
                    state.sequence += 1;
                }
            }
            Ordering::Less => self.cold_clock_behind(now, state)?,
        }
        let id = self.pack(state)?;
        state.claimed = true;
        Ok(id)
    }

    /// Moves into a fresh clock sequence so identifiers issued from the
    /// rolled back region cannot repeat earlier ones.
    #[cold]
    #[inline(never)]
    fn cold_clock_behind(&self, now: i64, state: &mut State) -> Result<()> {
        let last = state.timestamp;
        if state.clock_sequence >= self.packing.clock_sequence().max() {
            #[cfg(feature = "tracing")]
            tracing::warn!(now, last, "clock moved backwards");
            return Err(Error::ClockRollback { now, last });
        }

        state.clock_sequence += 1;
        state.timestamp = now;
        state.sequence = 0;
        #[cfg(feature = "tracing")]
        tracing::warn!(
            now,
            last,
            clock_sequence = state.clock_sequence,
            "clock moved backwards, advanced clock sequence"
        );
        Ok(())
    }

    fn pack(&self, state: &State) -> Result<i64> {
        self.packing.pack(&Parts {
            timestamp: state.timestamp,
            clock_sequence: state.clock_sequence,
            machine_id: self.machine_id,
            sequence: state.sequence,
        })
    }
}
