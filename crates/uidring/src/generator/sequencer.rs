use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{BitLayout, Error, Result, TimeSource, UidParts};

/// Turns successive clock reads into unique `(delta_seconds, worker_id,
/// sequence)` triples.
///
/// The sequencer owns mutable state (`last_second`, `sequence`) and takes
/// `&mut self`. To share one between threads, put it behind a mutex, as
/// [`DefaultUidGenerator`] does.
///
/// ## Guarantees
/// - Never returns the same `(second, sequence)` pair twice.
/// - `last_second` never decreases: a clock that moves backwards produces
///   [`Error::ClockRolledBack`] instead of an ID.
/// - When the sequence space of the current second runs out, the call
///   busy-polls the clock until the next second starts.
///
/// [`DefaultUidGenerator`]: crate::DefaultUidGenerator
#[derive(Debug)]
pub struct ClockSequencer<T: TimeSource> {
    layout: Arc<BitLayout>,
    epoch_seconds: i64,
    worker_id: u64,
    last_second: i64,
    sequence: u64,
    time: T,
}

impl<T: TimeSource> ClockSequencer<T> {
    /// Creates a sequencer that has not issued anything yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerIdOutOfRange`] if `worker_id` does not fit the
    /// layout.
    pub fn new(layout: Arc<BitLayout>, epoch_seconds: i64, worker_id: u64, time: T) -> Result<Self> {
        if worker_id > layout.max_worker_id() {
            return Err(Error::WorkerIdOutOfRange {
                worker_id,
                max: layout.max_worker_id(),
            });
        }
        Ok(Self {
            layout,
            epoch_seconds,
            worker_id,
            last_second: -1,
            sequence: 0,
            time,
        })
    }

    /// Produces the next triple.
    ///
    /// # Errors
    ///
    /// - [`Error::TimestampExhausted`] once the clock is past what the
    ///   timestamp field can hold. Permanent.
    /// - [`Error::ClockRolledBack`] if the clock reads earlier than the last
    ///   issued second, or earlier than the epoch. Transient.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use uidring::{BitLayout, ClockSequencer, TimeSource, DEFAULT_EPOCH};
    ///
    /// struct FixedTime;
    /// impl TimeSource for FixedTime {
    ///     fn current_secs(&self) -> i64 {
    ///         DEFAULT_EPOCH + 100
    ///     }
    /// }
    ///
    /// let layout = Arc::new(BitLayout::default());
    /// let mut seq = ClockSequencer::new(layout, DEFAULT_EPOCH, 5, FixedTime).unwrap();
    /// let first = seq.next().unwrap();
    /// let second = seq.next().unwrap();
    /// assert_eq!((first.delta_seconds, first.worker_id, first.sequence), (100, 5, 0));
    /// assert_eq!(second.sequence, 1);
    /// ```
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn next(&mut self) -> Result<UidParts> {
        let mut now = self.current_second()?;

        if now < self.last_second {
            return Err(Self::cold_clock_behind(now, self.last_second));
        }

        // State is only committed once an ID is certain, so a failed spin
        // leaves the current second marked exhausted.
        let mut sequence = 0;
        if now == self.last_second {
            sequence = (self.sequence + 1) & self.layout.max_sequence();
            if sequence == 0 {
                now = self.wait_next_second(self.last_second)?;
            }
        }

        self.last_second = now;
        self.sequence = sequence;
        Ok(UidParts {
            delta_seconds: (now - self.epoch_seconds) as u64,
            worker_id: self.worker_id,
            sequence,
        })
    }

    /// Last second an ID was issued for, or `-1` before the first call.
    pub const fn last_second(&self) -> i64 {
        self.last_second
    }

    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    pub const fn worker_id(&self) -> u64 {
        self.worker_id
    }

    pub const fn epoch_seconds(&self) -> i64 {
        self.epoch_seconds
    }

    pub fn layout(&self) -> &BitLayout {
        &self.layout
    }

    /// Reads the clock and checks it against the epoch bounds.
    fn current_second(&self) -> Result<i64> {
        let now = self.time.current_secs();
        let delta = now - self.epoch_seconds;
        if delta < 0 {
            return Err(Self::cold_clock_behind(now, self.epoch_seconds));
        }
        if delta as u64 > self.layout.max_delta_seconds() {
            return Err(Self::cold_timestamp_exhausted(now));
        }
        Ok(now)
    }

    /// Spins on the clock until it reads a second strictly after `last`.
    fn wait_next_second(&self, last: i64) -> Result<i64> {
        loop {
            let now = self.current_second()?;
            if now > last {
                return Ok(now);
            }
            core::hint::spin_loop();
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: i64, last: i64) -> Error {
        let seconds_behind = last - now;
        debug_assert!(seconds_behind > 0);
        #[cfg(feature = "tracing")]
        tracing::warn!(seconds_behind, "clock moved backwards");
        Error::ClockRolledBack { seconds_behind }
    }

    #[cold]
    #[inline(never)]
    fn cold_timestamp_exhausted(now: i64) -> Error {
        #[cfg(feature = "tracing")]
        tracing::error!(now, "timestamp bits are exhausted");
        Error::TimestampExhausted { now }
    }
}
