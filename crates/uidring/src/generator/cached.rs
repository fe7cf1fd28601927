use core::time::Duration;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    BitLayout, CachedIdBuffer, Error, GeneratorConfig, ParsedUid, Result, SystemClock, TimeSource,
    UidGenerator, WorkerIdAssigner, worker::checked_worker_id,
};

/// A UID generator that serves IDs from a pre-filled [`CachedIdBuffer`].
///
/// Instead of reading the clock per call, the buffer's provider mints a
/// whole second at a time (`max_sequence + 1` UIDs) starting from the
/// second the generator was built, and keeps borrowing future seconds as
/// consumers drain it. Throughput is therefore not capped by the sequence
/// bits per wall-clock second, at the cost of UIDs whose timestamps can run
/// ahead of real time.
///
/// The buffer is filled synchronously during construction.
///
/// ## Features
/// - ✅ Thread-safe, lock-free on the hot path
/// - ✅ Background refill below the padding threshold
/// - ❌ Timestamps may lead wall time under sustained load
///
/// ## See Also
/// - [`DefaultUidGenerator`]
///
/// [`DefaultUidGenerator`]: crate::DefaultUidGenerator
#[derive(Debug)]
pub struct CachedUidGenerator {
    buffer: CachedIdBuffer,
    layout: Arc<BitLayout>,
    epoch_seconds: i64,
    worker_id: u64,
}

impl CachedUidGenerator {
    /// Creates a generator with the default configuration and the system
    /// clock.
    ///
    /// # Errors
    ///
    /// See [`Self::with_config`].
    ///
    /// # Example
    /// ```
    /// use uidring::{CachedUidGenerator, FixedWorkerId, UidGenerator};
    ///
    /// let generator = CachedUidGenerator::new(FixedWorkerId(3)).unwrap();
    /// let a = generator.get_uid().unwrap();
    /// let b = generator.get_uid().unwrap();
    /// assert!(b > a);
    /// assert_eq!(generator.parse_uid(b).worker_id, 3);
    /// ```
    pub fn new(assigner: impl WorkerIdAssigner) -> Result<Self> {
        Self::with_config(&GeneratorConfig::default(), assigner, SystemClock)
    }

    /// Creates a generator from a [`GeneratorConfig`].
    ///
    /// `time` is read once, to pick the first cached second.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidLayout`], [`Error::InvalidEpoch`],
    ///   [`Error::InvalidPaddingFactor`] or [`Error::InvalidCapacity`] for
    ///   bad config. The epoch must not lie after `time`.
    /// - Any error from the worker-id assigner, or
    ///   [`Error::WorkerIdOutOfRange`].
    /// - [`Error::ThreadSpawn`] if `schedule_interval` is set and the
    ///   scheduler thread cannot start.
    pub fn with_config(
        config: &GeneratorConfig,
        assigner: impl WorkerIdAssigner,
        time: impl TimeSource,
    ) -> Result<Self> {
        let layout = Arc::new(config.layout()?);
        let epoch_seconds = config.epoch_seconds()?;
        let now = time.current_secs();
        if epoch_seconds > now {
            return Err(Error::InvalidEpoch(config.epoch.clone()));
        }
        let worker_id = checked_worker_id(&assigner, &layout)?;
        let capacity = config.buffer_size()?;
        let padding_factor = config.checked_padding_factor()?;

        let provider = {
            let layout = Arc::clone(&layout);
            move |second: i64| ids_for_second(&layout, epoch_seconds, worker_id, second)
        };
        // The first refill mints `now`.
        let mut buffer = CachedIdBuffer::starting_at(capacity, padding_factor, now - 1, provider)?;
        let _filled = buffer.padding_now();
        #[cfg(feature = "tracing")]
        tracing::debug!(worker_id, capacity, filled = _filled, "cached uid generator ready");

        if let Some(secs) = config.schedule_interval {
            buffer.start_scheduled_padding(Duration::from_secs(secs))?;
        }

        Ok(Self {
            buffer,
            layout,
            epoch_seconds,
            worker_id,
        })
    }

    /// Takes the next cached UID.
    ///
    /// # Errors
    ///
    /// [`Error::BufferEmpty`] if consumers outran the refill. Retry, or
    /// fall back to a [`DefaultUidGenerator`](crate::DefaultUidGenerator).
    /// [`Error::TimestampExhausted`] once the cached seconds have run past
    /// the timestamp field and the buffer is drained. Permanent.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_get_uid(&self) -> Result<u64> {
        self.buffer.take()
    }

    /// Stops the scheduled padding thread, if one was configured.
    pub fn shutdown(&self) {
        self.buffer.shutdown();
    }

    pub fn buffer(&self) -> &CachedIdBuffer {
        &self.buffer
    }

    pub fn layout(&self) -> &Arc<BitLayout> {
        &self.layout
    }

    pub const fn epoch_seconds(&self) -> i64 {
        self.epoch_seconds
    }

    pub const fn worker_id(&self) -> u64 {
        self.worker_id
    }
}

impl UidGenerator for CachedUidGenerator {
    fn get_uid(&self) -> Result<u64> {
        self.try_get_uid()
    }

    fn parse_uid(&self, uid: u64) -> ParsedUid {
        ParsedUid::decode(&self.layout, self.epoch_seconds, uid)
    }
}

/// Every UID for `second`, sequence `0..=max_sequence` in order.
///
/// # Errors
///
/// [`Error::ClockRolledBack`] for a second before the epoch, and
/// [`Error::TimestampExhausted`] past the last representable second.
pub fn ids_for_second(
    layout: &BitLayout,
    epoch_seconds: i64,
    worker_id: u64,
    second: i64,
) -> Result<Vec<u64>> {
    let delta = second - epoch_seconds;
    if delta < 0 {
        return Err(Error::ClockRolledBack {
            seconds_behind: -delta,
        });
    }
    if delta as u64 > layout.max_delta_seconds() {
        return Err(Error::TimestampExhausted { now: second });
    }
    let first = layout.allocate(delta as u64, worker_id, 0);
    Ok((0..=layout.max_sequence()).map(|seq| first + seq).collect())
}
