use core::fmt;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    BitLayout, ClockSequencer, Error, GeneratorConfig, ParsedUid, Result, SystemClock, TimeSource,
    UidGenerator, WorkerIdAssigner,
    generator::{Mutex, lock},
    worker::checked_worker_id,
};

/// A lock-based UID generator that reads the clock on every call.
///
/// This generator wraps a [`ClockSequencer`] in a [`Mutex`], allowing safe
/// shared use across threads. It is the uncached path: every
/// [`get_uid`](UidGenerator::get_uid) pays for a clock read and, at most
/// 2^sequence_bits calls per second, a spin until the next second.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ No background threads
/// - ❌ Throughput capped by the sequence bits per second
///
/// ## See Also
/// - [`CachedUidGenerator`]
///
/// [`CachedUidGenerator`]: crate::CachedUidGenerator
pub struct DefaultUidGenerator<T = SystemClock>
where
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<ClockSequencer<T>>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<ClockSequencer<T>>,
    layout: Arc<BitLayout>,
    epoch_seconds: i64,
    worker_id: u64,
}

impl DefaultUidGenerator<SystemClock> {
    /// Creates a generator with the default layout (28, 22, 13), the default
    /// epoch (2016-05-20) and the system clock.
    ///
    /// # Errors
    ///
    /// Fails if the assigner fails or returns an ID that does not fit.
    ///
    /// # Example
    /// ```
    /// use uidring::{DefaultUidGenerator, FixedWorkerId, UidGenerator};
    ///
    /// let generator = DefaultUidGenerator::new(FixedWorkerId(1)).unwrap();
    /// let uid = generator.get_uid().unwrap();
    /// assert_eq!(generator.parse_uid(uid).worker_id, 1);
    /// ```
    pub fn new(assigner: impl WorkerIdAssigner) -> Result<Self> {
        Self::with_config(&GeneratorConfig::default(), assigner, SystemClock)
    }
}

impl<T> DefaultUidGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator from a [`GeneratorConfig`] and an explicit time
    /// source.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidLayout`] / [`Error::InvalidEpoch`] for bad config.
    /// - [`Error::InvalidEpoch`] if the epoch is later than `time` reads now.
    /// - Any error from the worker-id assigner, or
    ///   [`Error::WorkerIdOutOfRange`].
    pub fn with_config(
        config: &GeneratorConfig,
        assigner: impl WorkerIdAssigner,
        time: T,
    ) -> Result<Self> {
        let layout = Arc::new(config.layout()?);
        let epoch_seconds = config.epoch_seconds()?;
        if epoch_seconds > time.current_secs() {
            return Err(Error::InvalidEpoch(config.epoch.clone()));
        }
        let worker_id = checked_worker_id(&assigner, &layout)?;
        Self::from_components(layout, epoch_seconds, worker_id, time)
    }

    /// Creates a generator from already validated parts.
    ///
    /// This constructor is primarily useful for sharing one
    /// [`BitLayout`] between several generators, or for tests with a mocked
    /// time source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerIdOutOfRange`] if `worker_id` does not fit.
    pub fn from_components(
        layout: Arc<BitLayout>,
        epoch_seconds: i64,
        worker_id: u64,
        time: T,
    ) -> Result<Self> {
        let sequencer = ClockSequencer::new(Arc::clone(&layout), epoch_seconds, worker_id, time)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(worker_id, epoch_seconds, ?layout, "uid generator ready");
        Ok(Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(Mutex::new(sequencer)),
            #[cfg(not(feature = "cache-padded"))]
            state: Mutex::new(sequencer),
            layout,
            epoch_seconds,
            worker_id,
        })
    }

    /// Generates the next UID.
    ///
    /// # Errors
    /// - [`Error::TimestampExhausted`]: the layout ran out of seconds.
    /// - [`Error::ClockRolledBack`]: the clock moved backwards; retry later.
    /// - [`Error::LockPoisoned`]: only without the `parking-lot` feature.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_get_uid(&self) -> Result<u64> {
        let parts = {
            let mut sequencer = lock!(self.state);
            sequencer.next()?
        };
        Ok(self
            .layout
            .allocate(parts.delta_seconds, parts.worker_id, parts.sequence))
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

impl<T> UidGenerator for DefaultUidGenerator<T>
where
    T: TimeSource,
{
    fn get_uid(&self) -> Result<u64> {
        self.try_get_uid()
    }

    fn parse_uid(&self, uid: u64) -> ParsedUid {
        ParsedUid::decode(&self.layout, self.epoch_seconds, uid)
    }
}

impl<T> fmt::Debug for DefaultUidGenerator<T>
where
    T: TimeSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultUidGenerator")
            .field("layout", &self.layout)
            .field("epoch_seconds", &self.epoch_seconds)
            .field("worker_id", &self.worker_id)
            .finish_non_exhaustive()
    }
}
