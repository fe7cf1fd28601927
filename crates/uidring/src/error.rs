/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `uidring` can emit.
///
/// Construction-time variants (`InvalidLayout`, `InvalidCapacity`, ...) mean
/// the component was never usable. At runtime, [`Error::is_transient`] tells
/// the caller whether a retry can succeed.
///
/// Broken buffer bookkeeping (a slot flag that disagrees with the cursors) is
/// not represented here: it panics, since continuing could hand out the same
/// ID twice.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// `1 + timestamp_bits + worker_id_bits + sequence_bits` is not 64.
    #[error(
        "invalid bit layout: 1 + timestamp({timestamp_bits}) + worker_id({worker_id_bits}) + sequence({sequence_bits}) must be 64"
    )]
    InvalidLayout {
        timestamp_bits: u8,
        worker_id_bits: u8,
        sequence_bits: u8,
    },

    /// The ring buffer capacity is not a non-zero power of two.
    #[error("ring buffer capacity {0} must be a power of two")]
    InvalidCapacity(usize),

    /// The padding factor is outside `0..=100`.
    #[error("padding factor {0} must be within 0..=100")]
    InvalidPaddingFactor(u8),

    /// The configured epoch could not be parsed as a `YYYY-MM-DD` date, or it
    /// lies after the current time.
    #[error("invalid epoch `{0}`")]
    InvalidEpoch(String),

    /// The worker-id assigner returned an id that does not fit the layout.
    #[error("worker id {worker_id} exceeds the max allowed value {max}")]
    WorkerIdOutOfRange { worker_id: u64, max: u64 },

    /// The worker-id assigner itself failed.
    #[error("worker id assignment failed: {0}")]
    WorkerIdUnavailable(String),

    /// The timestamp field can no longer represent the current second. This
    /// never heals for a given layout and epoch.
    #[error("timestamp bits are exhausted, refusing to generate uid at {now}")]
    TimestampExhausted { now: i64 },

    /// The clock moved backwards relative to the last issued second.
    #[error("clock moved backwards, refusing to generate uid for {seconds_behind} seconds")]
    ClockRolledBack { seconds_behind: i64 },

    /// No unread ID was cached at the time of the take.
    #[error("ring buffer is empty")]
    BufferEmpty,

    /// The OS refused to start the background padding thread.
    #[error("failed to spawn padding thread: {0}")]
    ThreadSpawn(String),

    /// The operation failed because the lock was **poisoned**.
    ///
    /// This occurs when a thread panics while holding the lock. When the
    /// `parking-lot` feature is enabled, mutexes do **not** poison, so this
    /// variant is not available.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("mutex is poisoned (i.e. a panic happened while it was locked)")]
    LockPoisoned,
}

impl Error {
    /// Returns `true` if retrying the same call later may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ClockRolledBack { .. } | Self::BufferEmpty)
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
