use core::time::Duration;
use std::{
    cell::Cell,
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicI64, Ordering},
    },
    thread::{self, scope},
};

use crate::{
    BitLayout, CachedUidGenerator, ClockSequencer, DEFAULT_EPOCH, DefaultUidGenerator, Error,
    FixedWorkerId, GeneratorConfig, Result, SystemClock, TimeSource, UidGenerator, ids_for_second,
};

struct MockTime {
    secs: i64,
}

impl TimeSource for MockTime {
    fn current_secs(&self) -> i64 {
        self.secs
    }
}

/// Returns each value once, then repeats the last one.
struct MockStepTime {
    values: Vec<i64>,
    index: Cell<usize>,
}

impl MockStepTime {
    fn new(values: impl Into<Vec<i64>>) -> Self {
        Self {
            values: values.into(),
            index: Cell::new(0),
        }
    }
}

impl TimeSource for MockStepTime {
    fn current_secs(&self) -> i64 {
        let i = self.index.get();
        self.index.set((i + 1).min(self.values.len() - 1));
        self.values[i]
    }
}

/// A clock another thread can move.
#[derive(Clone)]
struct SharedTime(Arc<AtomicI64>);

impl TimeSource for SharedTime {
    fn current_secs(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }
}

fn default_layout() -> Arc<BitLayout> {
    Arc::new(BitLayout::default())
}

/// 32 UIDs per second and a 128 slot ring.
fn small_config() -> GeneratorConfig {
    GeneratorConfig {
        timestamp_bits: 28,
        worker_id_bits: 30,
        sequence_bits: 5,
        boost_power: 2,
        ..Default::default()
    }
}

fn next_uid(generator: &impl UidGenerator) -> u64 {
    loop {
        match generator.get_uid() {
            Ok(uid) => return uid,
            Err(Error::BufferEmpty) => thread::yield_now(),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}

fn run_generator_unique_threaded<G>(generator: G, threads: usize, per_thread: usize)
where
    G: UidGenerator + Send + Sync,
{
    let generator = Arc::new(generator);
    let seen = Arc::new(Mutex::new(HashSet::with_capacity(threads * per_thread)));

    scope(|s| {
        for _ in 0..threads {
            let generator = Arc::clone(&generator);
            let seen = Arc::clone(&seen);
            s.spawn(move || {
                let mut local = Vec::with_capacity(per_thread);
                for _ in 0..per_thread {
                    local.push(next_uid(&*generator));
                }
                let mut seen = seen.lock().unwrap();
                for uid in local {
                    assert!(seen.insert(uid), "duplicate uid {uid}");
                }
            });
        }
    });

    assert_eq!(seen.lock().unwrap().len(), threads * per_thread);
}

#[test]
fn first_two_uids_share_the_mocked_second() {
    let generator = DefaultUidGenerator::with_config(
        &GeneratorConfig::default(),
        FixedWorkerId(5),
        MockTime {
            secs: DEFAULT_EPOCH + 100,
        },
    )
    .unwrap();
    let layout = BitLayout::default();

    assert_eq!(generator.get_uid().unwrap(), layout.allocate(100, 5, 0));
    assert_eq!(generator.get_uid().unwrap(), layout.allocate(100, 5, 1));

    let parsed = generator.parse_uid(layout.allocate(100, 5, 1));
    assert_eq!(parsed.worker_id, 5);
    assert_eq!(parsed.sequence, 1);
    assert_eq!(parsed.timestamp.unwrap().timestamp(), DEFAULT_EPOCH + 100);
}

#[test]
fn sequence_resets_on_new_second() {
    let time = MockStepTime::new([DEFAULT_EPOCH + 7, DEFAULT_EPOCH + 7, DEFAULT_EPOCH + 9]);
    let mut sequencer = ClockSequencer::new(default_layout(), DEFAULT_EPOCH, 1, time).unwrap();

    let parts: Vec<_> = (0..3)
        .map(|_| {
            let p = sequencer.next().unwrap();
            (p.delta_seconds, p.sequence)
        })
        .collect();
    assert_eq!(parts, [(7, 0), (7, 1), (9, 0)]);
    assert_eq!(sequencer.last_second(), DEFAULT_EPOCH + 9);
}

#[test]
fn exhausted_sequence_spins_until_clock_advances() {
    let clock = Arc::new(AtomicI64::new(DEFAULT_EPOCH + 100));
    let layout = default_layout();
    let mut sequencer =
        ClockSequencer::new(Arc::clone(&layout), DEFAULT_EPOCH, 1, SharedTime(Arc::clone(&clock)))
            .unwrap();

    for expected in 0..=layout.max_sequence() {
        let parts = sequencer.next().unwrap();
        assert_eq!(parts.delta_seconds, 100);
        assert_eq!(parts.sequence, expected);
    }

    let waiter = thread::spawn(move || sequencer.next());
    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished(), "sequencer returned without a new second");

    clock.store(DEFAULT_EPOCH + 101, Ordering::Release);
    let parts = waiter.join().unwrap().unwrap();
    assert_eq!(parts.delta_seconds, 101);
    assert_eq!(parts.sequence, 0);
}

#[test]
fn failed_spin_keeps_the_exhausted_second_closed() {
    let layout = Arc::new(BitLayout::new(28, 30, 5).unwrap());
    let mut reads = vec![DEFAULT_EPOCH + 100; 33];
    reads.extend([DEFAULT_EPOCH - 1, DEFAULT_EPOCH + 100, DEFAULT_EPOCH + 101]);
    let mut sequencer =
        ClockSequencer::new(Arc::clone(&layout), DEFAULT_EPOCH, 1, MockStepTime::new(reads))
            .unwrap();

    let mut seen = HashSet::new();
    for _ in 0..=layout.max_sequence() {
        let parts = sequencer.next().unwrap();
        assert!(seen.insert((parts.delta_seconds, parts.sequence)));
    }
    // Wraps, then reads a pre-epoch second while spinning.
    assert_eq!(
        sequencer.next(),
        Err(Error::ClockRolledBack { seconds_behind: 1 })
    );
    assert_eq!(sequencer.last_second(), DEFAULT_EPOCH + 100);
    assert_eq!(sequencer.sequence(), layout.max_sequence());

    // Back on the exhausted second, it has to spin again.
    let parts = sequencer.next().unwrap();
    assert_eq!((parts.delta_seconds, parts.sequence), (101, 0));
    assert!(seen.insert((parts.delta_seconds, parts.sequence)));
    let parts = sequencer.next().unwrap();
    assert_eq!((parts.delta_seconds, parts.sequence), (101, 1));
}

#[test]
fn timestamp_exhaustion_while_spinning_issues_nothing() {
    let layout = Arc::new(BitLayout::new(8, 50, 5).unwrap());
    let last = DEFAULT_EPOCH + layout.max_delta_seconds() as i64;
    let mut reads = vec![last; 33];
    reads.extend([last + 1, last, last + 1]);
    let mut sequencer =
        ClockSequencer::new(Arc::clone(&layout), DEFAULT_EPOCH, 1, MockStepTime::new(reads))
            .unwrap();

    for expected in 0..=layout.max_sequence() {
        assert_eq!(sequencer.next().unwrap().sequence, expected);
    }
    assert_eq!(
        sequencer.next(),
        Err(Error::TimestampExhausted { now: last + 1 })
    );
    assert_eq!(
        sequencer.next(),
        Err(Error::TimestampExhausted { now: last + 1 })
    );
    assert_eq!(sequencer.sequence(), layout.max_sequence());
}

#[test]
fn parses_uids_from_the_widest_layouts() {
    let now = MockTime {
        secs: DEFAULT_EPOCH + 100,
    };
    for (timestamp_bits, worker_id_bits, sequence_bits) in [(63, 0, 0), (62, 0, 1), (0, 0, 63)] {
        let config = GeneratorConfig {
            timestamp_bits,
            worker_id_bits,
            sequence_bits,
            ..Default::default()
        };
        let generator = DefaultUidGenerator::with_config(&config, FixedWorkerId(0), &now).unwrap();
        let layout = config.layout().unwrap();

        let parsed = generator.parse_uid(u64::MAX >> 1);
        assert_eq!(parsed.delta_seconds, layout.max_delta_seconds());
        assert_eq!(parsed.sequence, layout.max_sequence());
        assert_eq!(parsed.worker_id, 0);
        if timestamp_bits > 0 {
            assert_eq!(parsed.timestamp, None);
        } else {
            assert_eq!(parsed.timestamp.unwrap().timestamp(), DEFAULT_EPOCH);
        }
    }
}

#[test]
fn rejects_clock_moving_backwards() {
    let time = MockStepTime::new([DEFAULT_EPOCH + 100, DEFAULT_EPOCH + 97, DEFAULT_EPOCH + 100]);
    let mut sequencer = ClockSequencer::new(default_layout(), DEFAULT_EPOCH, 1, time).unwrap();

    sequencer.next().unwrap();
    assert_eq!(
        sequencer.next(),
        Err(Error::ClockRolledBack { seconds_behind: 3 })
    );
    // Nothing was consumed by the failed call.
    assert_eq!(sequencer.next().unwrap().sequence, 1);
}

#[test]
fn rejects_clock_before_epoch() {
    let time = MockTime {
        secs: DEFAULT_EPOCH - 5,
    };
    let mut sequencer = ClockSequencer::new(default_layout(), DEFAULT_EPOCH, 1, time).unwrap();
    assert_eq!(
        sequencer.next(),
        Err(Error::ClockRolledBack { seconds_behind: 5 })
    );
}

#[test]
fn fails_once_timestamp_bits_run_out() {
    let layout = default_layout();
    let last = DEFAULT_EPOCH + layout.max_delta_seconds() as i64;

    let mut sequencer =
        ClockSequencer::new(Arc::clone(&layout), DEFAULT_EPOCH, 1, MockTime { secs: last })
            .unwrap();
    assert_eq!(
        sequencer.next().unwrap().delta_seconds,
        layout.max_delta_seconds()
    );

    let mut sequencer =
        ClockSequencer::new(layout, DEFAULT_EPOCH, 1, MockTime { secs: last + 1 }).unwrap();
    let err = sequencer.next().unwrap_err();
    assert_eq!(err, Error::TimestampExhausted { now: last + 1 });
    assert!(!err.is_transient());
}

#[test]
fn construction_checks_worker_and_epoch() {
    let now = MockTime {
        secs: DEFAULT_EPOCH + 100,
    };
    let max = BitLayout::default().max_worker_id();

    let err =
        DefaultUidGenerator::with_config(&GeneratorConfig::default(), FixedWorkerId(max + 1), &now)
            .unwrap_err();
    assert_eq!(
        err,
        Error::WorkerIdOutOfRange {
            worker_id: max + 1,
            max
        }
    );

    let future = GeneratorConfig {
        epoch: "2100-01-01".into(),
        ..Default::default()
    };
    assert_eq!(
        DefaultUidGenerator::with_config(&future, FixedWorkerId(1), &now).unwrap_err(),
        Error::InvalidEpoch("2100-01-01".into())
    );

    let unavailable = || -> Result<u64> { Err(Error::WorkerIdUnavailable("no lease".into())) };
    assert_eq!(
        CachedUidGenerator::with_config(&GeneratorConfig::default(), unavailable, &now)
            .unwrap_err(),
        Error::WorkerIdUnavailable("no lease".into())
    );

    let bad_factor = GeneratorConfig {
        padding_factor: 150,
        ..small_config()
    };
    assert_eq!(
        CachedUidGenerator::with_config(&bad_factor, FixedWorkerId(1), &now).unwrap_err(),
        Error::InvalidPaddingFactor(150)
    );
}

#[test]
fn default_generator_is_monotonic() {
    let generator = DefaultUidGenerator::new(FixedWorkerId(9)).unwrap();
    let mut last = 0;
    for _ in 0..10_000 {
        let uid = generator.get_uid().unwrap();
        assert!(uid > last);
        last = uid;
    }
    assert_eq!(generator.parse_uid(last).worker_id, 9);
}

#[test]
fn default_generator_unique_threaded() {
    let generator = DefaultUidGenerator::new(FixedWorkerId(1)).unwrap();
    run_generator_unique_threaded(generator, 8, 1024);
}

#[test]
fn ids_for_second_covers_the_whole_sequence_space() {
    let layout = BitLayout::new(28, 30, 5).unwrap();
    let uids = ids_for_second(&layout, DEFAULT_EPOCH, 3, DEFAULT_EPOCH + 10).unwrap();
    assert_eq!(uids.len(), 32);
    for (seq, uid) in uids.iter().enumerate() {
        assert_eq!(*uid, layout.allocate(10, 3, seq as u64));
    }

    assert_eq!(
        ids_for_second(&layout, DEFAULT_EPOCH, 3, DEFAULT_EPOCH - 1),
        Err(Error::ClockRolledBack { seconds_behind: 1 })
    );
    let past_end = DEFAULT_EPOCH + layout.max_delta_seconds() as i64 + 1;
    assert_eq!(
        ids_for_second(&layout, DEFAULT_EPOCH, 3, past_end),
        Err(Error::TimestampExhausted { now: past_end })
    );
}

#[test]
fn cached_generator_starts_at_construction_second() {
    let config = small_config();
    let generator = CachedUidGenerator::with_config(
        &config,
        FixedWorkerId(4),
        MockTime {
            secs: DEFAULT_EPOCH + 100,
        },
    )
    .unwrap();
    let layout = config.layout().unwrap();

    assert_eq!(generator.buffer().capacity(), 128);
    assert_eq!(generator.buffer().len(), 127);
    assert_eq!(generator.get_uid().unwrap(), layout.allocate(100, 4, 0));
    assert_eq!(generator.get_uid().unwrap(), layout.allocate(100, 4, 1));
}

#[test]
fn cached_generator_borrows_future_seconds_in_order() {
    let config = small_config();
    let generator = CachedUidGenerator::with_config(
        &config,
        FixedWorkerId(4),
        MockTime {
            secs: DEFAULT_EPOCH + 100,
        },
    )
    .unwrap();

    let mut last = None;
    let mut last_second = 0;
    for _ in 0..2_000 {
        let uid = next_uid(&generator);
        if let Some(prev) = last {
            assert!(uid > prev, "{uid} after {prev}");
        }
        let parsed = generator.parse_uid(uid);
        assert_eq!(parsed.worker_id, 4);
        let second = parsed.timestamp.unwrap().timestamp();
        assert!(second >= last_second);
        last_second = second;
        last = Some(uid);
    }
    assert!(last_second > DEFAULT_EPOCH + 100 + 2_000 / 32 - 1);
}

#[test]
fn cached_generator_reports_timestamp_exhaustion() {
    let config = GeneratorConfig {
        timestamp_bits: 8,
        worker_id_bits: 50,
        ..small_config()
    };
    let last = DEFAULT_EPOCH + 255;
    let generator =
        CachedUidGenerator::with_config(&config, FixedWorkerId(4), MockTime { secs: last })
            .unwrap();
    assert_eq!(generator.buffer().len(), 32);

    for _ in 0..32 {
        generator.get_uid().unwrap();
    }
    let err = generator.get_uid().unwrap_err();
    assert_eq!(err, Error::TimestampExhausted { now: last + 1 });
    assert!(!err.is_transient());
}

#[test]
fn cached_generator_unique_threaded() {
    let generator =
        CachedUidGenerator::with_config(&small_config(), FixedWorkerId(2), SystemClock).unwrap();
    run_generator_unique_threaded(generator, 8, 2_000);
}

#[test]
fn cached_generator_with_scheduler_shuts_down() {
    let config = GeneratorConfig {
        schedule_interval: Some(1),
        ..small_config()
    };
    let generator = CachedUidGenerator::with_config(&config, FixedWorkerId(2), SystemClock).unwrap();
    assert!(generator.buffer().is_scheduled());
    next_uid(&generator);
    generator.shutdown();
    drop(generator);
}
