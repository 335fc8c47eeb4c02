use core::time::Duration;
use std::collections::{HashSet, VecDeque};
use std::sync::{
    Arc, Mutex as StdMutex,
    atomic::{AtomicI64, Ordering},
};
use std::thread::scope;

use crate::{
    Backoff, BitLayout, Error, Policy, RandSource, TimeSource, Worker, decompose,
    extract_machine_id,
};

#[derive(Clone)]
struct MockTime {
    millis: Arc<AtomicI64>,
}

impl MockTime {
    fn at(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource<i64> for MockTime {
    fn current_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Hands out the scripted readings in order, then repeats the last one.
#[derive(Clone)]
struct ScriptedTime {
    script: Arc<StdMutex<(VecDeque<i64>, i64)>>,
}

impl ScriptedTime {
    fn new(values: &[i64]) -> Self {
        Self {
            script: Arc::new(StdMutex::new((values.iter().copied().collect(), 0))),
        }
    }

    fn remaining(&self) -> usize {
        self.script.lock().unwrap().0.len()
    }
}

impl TimeSource<i64> for ScriptedTime {
    fn current_millis(&self) -> i64 {
        let mut script = self.script.lock().unwrap();
        if let Some(next) = script.0.pop_front() {
            script.1 = next;
        }
        script.1
    }
}

struct FixedRand(u64);

impl RandSource<u64> for FixedRand {
    fn rand(&self) -> u64 {
        self.0
    }
}

const NO_WAIT: Backoff = Backoff::new(3, Duration::ZERO, Duration::ZERO);

fn twitter_layout() -> BitLayout {
    BitLayout::new(0, 41, 10, 12).unwrap()
}

fn logical<T: TimeSource<i64>>(
    layout: BitLayout,
    machine_id: i64,
    time: T,
) -> Worker<T, FixedRand> {
    Worker::with_sources(layout, machine_id, Policy::LogicalTick, time, FixedRand(0)).unwrap()
}

fn wall_clock<T: TimeSource<i64>>(
    layout: BitLayout,
    machine_id: i64,
    time: T,
) -> Worker<T, FixedRand> {
    Worker::with_sources(layout, machine_id, Policy::WallClock, time, FixedRand(0))
        .unwrap()
        .with_backoff(NO_WAIT)
}

#[test]
fn new_worker_accepts_machine_ids_in_range() {
    let layout = twitter_layout();
    for machine_id in [0, 1, 512, 1023] {
        let worker = Worker::new(layout, machine_id).unwrap();
        assert_eq!(worker.machine_id(), machine_id);
        assert_eq!(worker.policy(), Policy::LogicalTick);
        assert_eq!(worker.layout(), &layout);
    }
    assert_eq!(
        Worker::wall_clock(layout, 7).unwrap().policy(),
        Policy::WallClock
    );
}

#[test]
fn new_worker_rejects_illegal_machine_ids() {
    let layout = twitter_layout();
    for machine_id in [-1, i64::MIN, 1024, i64::MAX] {
        assert_eq!(
            Worker::new(layout, machine_id).unwrap_err(),
            Error::MachineIdIllegal {
                machine_id,
                max: 1023
            }
        );
    }
}

#[test]
fn new_worker_rechecks_bit_sum() {
    let layout = BitLayout::new_unchecked(0, 40, 0, 10, 12);
    assert_eq!(
        Worker::new(layout, 1).unwrap_err(),
        Error::BitsSum { sum: 62 }
    );
    let layout = BitLayout::new_unchecked(0, 41, 1, 10, 12);
    assert_eq!(
        Worker::wall_clock(layout, 1).unwrap_err(),
        Error::BitsSum { sum: 64 }
    );
}

#[test]
fn first_id_uses_construction_time_and_sequence_zero() {
    let mut layout = twitter_layout();
    layout.set_epoch(Duration::from_millis(1_000));
    let worker = logical(layout, 5, MockTime::at(1_042));

    let parts = decompose(&layout, worker.generate_id().unwrap()).unwrap();
    assert_eq!(parts.timestamp, 42);
    assert_eq!(parts.machine_id, 5);
    assert_eq!(parts.sequence, 0);
    assert_eq!(parts.clock_sequence, 0);
    assert_eq!(parts.unix_millis(&layout), 1_042);
}

#[test]
fn first_id_extracts_to_machine_id() {
    let layout = twitter_layout();
    let worker = Worker::new(layout, 5).unwrap();
    let id = worker.generate_id().unwrap();
    assert!(id >= 0);
    assert_eq!(extract_machine_id(&layout, id).unwrap(), 5);
}

#[test]
fn logical_sequence_increments_within_tick() {
    let layout = twitter_layout();
    let worker = logical(layout, 1, MockTime::at(42));

    let ids: Vec<_> = (0..3).map(|_| worker.generate_id().unwrap()).collect();
    for (i, id) in ids.iter().enumerate() {
        let parts = decompose(&layout, *id).unwrap();
        assert_eq!(parts.timestamp, 42);
        assert_eq!(parts.sequence, i as i64);
    }
    assert!(ids[0] < ids[1] && ids[1] < ids[2]);
}

#[test]
fn logical_rollover_advances_exactly_one_tick() {
    // 4 sequence bits: 16 ids per tick
    let layout = BitLayout::new(0, 49, 10, 4).unwrap();
    let worker = logical(layout, 3, MockTime::at(42));

    for i in 0..16 {
        let parts = decompose(&layout, worker.generate_id().unwrap()).unwrap();
        assert_eq!(parts.timestamp, 42);
        assert_eq!(parts.sequence, i);
    }

    // The 17th call lands on the next tick with a fresh sequence
    let parts = decompose(&layout, worker.generate_id().unwrap()).unwrap();
    assert_eq!(parts.timestamp, 43);
    assert_eq!(parts.sequence, 0);
    assert_eq!(parts.machine_id, 3);
}

#[test]
fn logical_ignores_clock_after_construction() {
    let layout = twitter_layout();
    let time = MockTime::at(1_000);
    let worker = logical(layout, 1, time.clone());

    let a = worker.generate_id().unwrap();
    time.set(10);
    let b = worker.generate_id().unwrap();
    time.set(5_000);
    let c = worker.generate_id().unwrap();

    assert!(a < b && b < c);
    assert_eq!(decompose(&layout, c).unwrap().timestamp, 1_000);
}

#[test]
fn logical_ids_are_unique_and_increasing_past_sequence_space() {
    let layout = BitLayout::new(0, 51, 4, 8).unwrap();
    let worker = logical(layout, 9, MockTime::at(7));

    const TOTAL: usize = 256 * 10 + 17;
    let mut last = None;
    let mut seen = HashSet::with_capacity(TOTAL);
    for _ in 0..TOTAL {
        let id = worker.generate_id().unwrap();
        if let Some(last) = last {
            assert!(id > last);
        }
        assert!(seen.insert(id));
        assert_eq!(extract_machine_id(&layout, id).unwrap(), 9);
        last = Some(id);
    }

    let parts = decompose(&layout, last.unwrap()).unwrap();
    assert_eq!(parts.timestamp, 7 + 10);
    assert_eq!(parts.sequence, 16);
}

#[test]
fn logical_ids_are_unique_across_threads() {
    const THREADS: usize = 100;
    const IDS_PER_THREAD: usize = 1_000;

    let layout = twitter_layout();
    let worker = Worker::new(layout, 1).unwrap();

    let per_thread: Vec<Vec<i64>> = scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    (0..IDS_PER_THREAD)
                        .map(|_| worker.generate_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut seen = HashSet::with_capacity(THREADS * IDS_PER_THREAD);
    for ids in &per_thread {
        // Each thread observes its own calls in lock order
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        for id in ids {
            assert!(seen.insert(*id), "duplicate id {id}");
            assert_eq!(extract_machine_id(&layout, *id).unwrap(), 1);
        }
    }
    assert_eq!(seen.len(), THREADS * IDS_PER_THREAD);
}

#[test]
fn distinct_machine_ids_never_collide() {
    let layout = BitLayout::new(0, 49, 10, 4).unwrap();
    let time = MockTime::at(100);
    let a = logical(layout, 1, time.clone());
    let b = logical(layout, 2, time);

    let mut seen = HashSet::new();
    for _ in 0..100 {
        assert!(seen.insert(a.generate_id().unwrap()));
        assert!(seen.insert(b.generate_id().unwrap()));
    }
}

#[test]
fn epoch_in_the_future_is_reported_on_generation() {
    let mut layout = twitter_layout();
    layout.set_epoch(Duration::from_millis(2_000));
    let worker = logical(layout, 1, MockTime::at(1_000));

    assert_eq!(
        worker.generate_id(),
        Err(Error::TimestampIllegal {
            timestamp: -1_000,
            max: (1 << 41) - 1
        })
    );
}

#[test]
fn logical_timestamp_exhaustion_is_reported() {
    // 2 timestamp bits and no sequence: every call advances the tick
    let layout = BitLayout::new(0, 2, 61, 0).unwrap();
    let worker = logical(layout, 1, MockTime::at(2));

    assert_eq!(decompose(&layout, worker.generate_id().unwrap()).unwrap().timestamp, 2);
    assert_eq!(decompose(&layout, worker.generate_id().unwrap()).unwrap().timestamp, 3);
    let err = Error::TimestampIllegal {
        timestamp: 4,
        max: 3,
    };
    assert_eq!(worker.generate_id(), Err(err.clone()));
    // The failed call did not move the state
    assert_eq!(worker.generate_id(), Err(err));
}

#[test]
fn wall_clock_follows_time() {
    let layout = twitter_layout();
    let time = MockTime::at(100);
    let worker = wall_clock(layout, 4, time.clone());

    let first = decompose(&layout, worker.generate_id().unwrap()).unwrap();
    assert_eq!((first.timestamp, first.sequence), (100, 0));
    let second = decompose(&layout, worker.generate_id().unwrap()).unwrap();
    assert_eq!((second.timestamp, second.sequence), (100, 1));

    time.set(250);
    let third = decompose(&layout, worker.generate_id().unwrap()).unwrap();
    assert_eq!((third.timestamp, third.sequence), (250, 0));
    assert_eq!(third.machine_id, 4);
}

#[test]
fn wall_clock_waits_out_sequence_exhaustion() {
    let layout = BitLayout::new(0, 49, 10, 4).unwrap();
    // construction, 16 calls at 100, two exhausted attempts, then 101
    let mut script = vec![100; 17];
    script.extend([100, 100, 101]);
    let time = ScriptedTime::new(&script);
    let worker = wall_clock(layout, 1, time.clone());

    for i in 0..16 {
        let parts = decompose(&layout, worker.generate_id().unwrap()).unwrap();
        assert_eq!((parts.timestamp, parts.sequence), (100, i));
    }
    let parts = decompose(&layout, worker.generate_id().unwrap()).unwrap();
    assert_eq!((parts.timestamp, parts.sequence), (101, 0));
    assert_eq!(time.remaining(), 0);
}

#[test]
fn wall_clock_surfaces_exhaustion_after_final_attempt() {
    let layout = BitLayout::new(0, 49, 10, 4).unwrap();
    let worker = wall_clock(layout, 1, MockTime::at(100));

    for _ in 0..16 {
        worker.generate_id().unwrap();
    }
    assert_eq!(
        worker.generate_id(),
        Err(Error::SequenceExhausted { timestamp: 100 })
    );
}

#[test]
fn wall_clock_retries_through_short_rollback() {
    let layout = twitter_layout();
    // construction, first id, two rolled back readings, recovery
    let time = ScriptedTime::new(&[100, 100, 90, 95, 101]);
    let worker = wall_clock(layout, 1, time.clone());

    let first = worker.generate_id().unwrap();
    let second = worker.generate_id().unwrap();
    assert!(second > first);
    assert_eq!(decompose(&layout, second).unwrap().timestamp, 101);
    assert_eq!(time.remaining(), 0);
}

#[test]
fn wall_clock_surfaces_persistent_rollback() {
    let layout = twitter_layout();
    let time = ScriptedTime::new(&[100, 100, 90, 90, 90, 90, 90]);
    let worker = wall_clock(layout, 1, time.clone());

    worker.generate_id().unwrap();
    assert_eq!(
        worker.generate_id(),
        Err(Error::ClockRollback { now: 90, last: 100 })
    );
    // three retries plus the final attempt
    assert_eq!(time.remaining(), 1);
}

#[test]
fn wall_clock_without_retries_fails_fast() {
    let layout = twitter_layout();
    let time = ScriptedTime::new(&[100, 100, 90, 90]);
    let worker = wall_clock(layout, 1, time.clone()).with_backoff(Backoff::NONE);

    worker.generate_id().unwrap();
    assert_eq!(
        worker.generate_id(),
        Err(Error::ClockRollback { now: 90, last: 100 })
    );
    assert_eq!(time.remaining(), 1);
}

#[test]
fn wall_clock_rollback_moves_to_next_clock_sequence() {
    // 2 clock sequence bits absorb three rollbacks
    let layout = BitLayout::with_clock_sequence(0, 39, 2, 10, 12).unwrap();
    let time = MockTime::at(100);
    let worker = wall_clock(layout, 6, time.clone()).with_backoff(Backoff::NONE);

    let mut seen = HashSet::new();
    let first = worker.generate_id().unwrap();
    seen.insert(first);
    assert_eq!(decompose(&layout, first).unwrap().clock_sequence, 0);

    for (clock_sequence, now) in [(1, 90), (2, 80), (3, 70)] {
        time.set(now);
        let id = worker.generate_id().unwrap();
        let parts = decompose(&layout, id).unwrap();
        assert_eq!(parts.clock_sequence, clock_sequence);
        assert_eq!(parts.timestamp, now);
        assert_eq!(parts.sequence, 0);
        assert_eq!(parts.machine_id, 6);
        assert!(seen.insert(id));

        // Same millisecond keeps counting within the new clock sequence
        let next = decompose(&layout, worker.generate_id().unwrap()).unwrap();
        assert_eq!((next.clock_sequence, next.sequence), (clock_sequence, 1));
    }

    time.set(60);
    assert_eq!(
        worker.generate_id(),
        Err(Error::ClockRollback { now: 60, last: 70 })
    );
}

#[test]
fn wall_clock_does_not_retry_fatal_errors() {
    let mut layout = twitter_layout();
    layout.set_epoch(Duration::from_millis(500));
    let time = ScriptedTime::new(&[100, 100, 100]);
    let worker = wall_clock(layout, 1, time.clone());

    assert!(matches!(
        worker.generate_id(),
        Err(Error::TimestampIllegal { timestamp: -400, .. })
    ));
    assert_eq!(time.remaining(), 1);
}

#[test]
fn wall_clock_rollback_right_after_construction_is_detected() {
    let layout = twitter_layout();
    let time = ScriptedTime::new(&[100, 99]);
    let worker = wall_clock(layout, 1, time).with_backoff(Backoff::NONE);

    assert_eq!(
        worker.generate_id(),
        Err(Error::ClockRollback { now: 99, last: 100 })
    );
}

#[test]
fn wall_clock_ids_are_unique_across_threads() {
    const THREADS: usize = 8;
    const IDS_PER_THREAD: usize = 5_000;

    let layout = twitter_layout();
    let worker = Worker::wall_clock(layout, 2).unwrap();

    let per_thread: Vec<Vec<i64>> = scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    (0..IDS_PER_THREAD)
                        .map(|_| loop {
                            // A real clock can step backwards under NTP; only
                            // retryable errors are tolerated here.
                            match worker.generate_id() {
                                Ok(id) => break id,
                                Err(e) => assert!(e.is_retryable(), "{e}"),
                            }
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut seen = HashSet::with_capacity(THREADS * IDS_PER_THREAD);
    for id in per_thread.into_iter().flatten() {
        assert!(seen.insert(id), "duplicate id {id}");
    }
}

#[test]
fn backoff_delay_stays_within_bounds() {
    let backoff = Backoff::default();
    assert_eq!(backoff.retries, 3);
    assert_eq!(backoff.delay(&FixedRand(0)), Duration::from_millis(1));
    assert_eq!(backoff.delay(&FixedRand(4)), Duration::from_millis(5));
    assert_eq!(backoff.delay(&FixedRand(5)), Duration::from_millis(1));
    assert_eq!(backoff.delay(&FixedRand(u64::MAX)), Duration::from_millis(1));

    let inverted = Backoff::new(1, Duration::from_millis(7), Duration::from_millis(2));
    assert_eq!(inverted.delay(&FixedRand(3)), Duration::from_millis(7));
    assert_eq!(Backoff::NONE.delay(&FixedRand(3)), Duration::ZERO);
}

#[test]
fn retryable_errors() {
    assert!(Error::ClockRollback { now: 1, last: 2 }.is_retryable());
    assert!(Error::SequenceExhausted { timestamp: 1 }.is_retryable());
    assert!(!Error::BitsSum { sum: 1 }.is_retryable());
    assert!(!Error::SeqIllegal { sequence: 1, max: 0 }.is_retryable());
}

#[test]
fn workers_can_be_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Worker>();
    assert_send_sync::<Worker<crate::MonotonicClock>>();
    assert_send_sync::<Worker<MockTime, FixedRand>>();
}
