use core::fmt;
use std::sync::atomic::{AtomicI64, AtomicU8, AtomicU64, Ordering};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[cfg(not(feature = "parking-lot"))]
use crate::generator::PoisonError;
use crate::{
    Error, LogRejection, RejectedPutHandler, RejectedTakeHandler, Result,
    generator::{Mutex, MutexGuard},
};

#[cfg(feature = "cache-padded")]
type Counter = crossbeam_utils::CachePadded<AtomicI64>;
#[cfg(not(feature = "cache-padded"))]
type Counter = AtomicI64;

/// Sequence value of `tail` and `cursor` before anything was put or taken.
const START_POINT: i64 = -1;

fn counter() -> Counter {
    #[cfg(feature = "cache-padded")]
    {
        crossbeam_utils::CachePadded::new(AtomicI64::new(START_POINT))
    }
    #[cfg(not(feature = "cache-padded"))]
    {
        AtomicI64::new(START_POINT)
    }
}

/// State of one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotFlag {
    /// Free: the slot was never written, or its value has been taken.
    ReadyForPut = 0,
    /// Holds a UID no consumer has read yet.
    ReadyForTake = 1,
}

impl SlotFlag {
    const fn from_u8(raw: u8) -> Self {
        if raw == Self::ReadyForTake as u8 {
            Self::ReadyForTake
        } else {
            Self::ReadyForPut
        }
    }
}

/// Outcome of [`RingBuffer::take`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Take {
    /// A UID was read. `needs_padding` is set once fewer than
    /// [`RingBuffer::padding_threshold`] unread UIDs remain.
    Ready { uid: u64, needs_padding: bool },
    /// Nothing was cached.
    Empty,
}

/// A fixed-capacity circular buffer of UIDs.
///
/// Two monotonic counters track progress: `tail` is the sequence number of
/// the last slot written, `cursor` the last slot consumed. Both start at
/// `-1`. A sequence number maps to slot `seq & (capacity - 1)`, and each
/// slot carries a [`SlotFlag`].
///
/// - Producers ([`put`](Self::put)) are serialized by a mutex.
/// - Consumers ([`take`](Self::take)) never lock. They race on `cursor`
///   with compare-and-swap; only the winner for a given sequence number
///   reads that slot.
///
/// One slot always stays free, so at most `capacity - 1` UIDs are unread at
/// any time.
pub struct RingBuffer {
    capacity: usize,
    index_mask: i64,
    slots: Box<[AtomicU64]>,
    flags: Box<[AtomicU8]>,
    tail: Counter,
    cursor: Counter,
    padding_threshold: usize,
    put_lock: Mutex<()>,
    rejected_put: Box<dyn RejectedPutHandler>,
    rejected_take: Box<dyn RejectedTakeHandler>,
}

impl RingBuffer {
    /// Creates an empty buffer.
    ///
    /// `padding_factor` is a percentage: a take that leaves fewer than
    /// `capacity * padding_factor / 100` unread UIDs asks for padding.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCapacity`] unless `capacity` is a power of two and
    ///   at least 2.
    /// - [`Error::InvalidPaddingFactor`] if `padding_factor > 100`.
    ///
    /// # Example
    ///
    /// ```
    /// use uidring::{RingBuffer, Take};
    ///
    /// let ring = RingBuffer::new(8, 50).unwrap();
    /// assert!(ring.put(42));
    /// assert_eq!(ring.take(), Take::Ready { uid: 42, needs_padding: true });
    /// assert_eq!(ring.take(), Take::Empty);
    /// ```
    pub fn new(capacity: usize, padding_factor: u8) -> Result<Self> {
        if capacity < 2 || !capacity.is_power_of_two() || i64::try_from(capacity).is_err() {
            return Err(Error::InvalidCapacity(capacity));
        }
        if padding_factor > 100 {
            return Err(Error::InvalidPaddingFactor(padding_factor));
        }
        Ok(Self {
            capacity,
            index_mask: capacity as i64 - 1,
            slots: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            flags: (0..capacity)
                .map(|_| AtomicU8::new(SlotFlag::ReadyForPut as u8))
                .collect(),
            tail: counter(),
            cursor: counter(),
            padding_threshold: capacity * usize::from(padding_factor) / 100,
            put_lock: Mutex::new(()),
            rejected_put: Box::new(LogRejection),
            rejected_take: Box::new(LogRejection),
        })
    }

    /// Replaces the handler run when a put is rejected.
    #[must_use]
    pub fn with_rejected_put_handler(mut self, handler: impl RejectedPutHandler + 'static) -> Self {
        self.rejected_put = Box::new(handler);
        self
    }

    /// Replaces the handler run when a take finds the buffer empty.
    #[must_use]
    pub fn with_rejected_take_handler(
        mut self,
        handler: impl RejectedTakeHandler + 'static,
    ) -> Self {
        self.rejected_take = Box::new(handler);
        self
    }

    /// Appends a UID.
    ///
    /// Returns `false`, leaving the buffer untouched, when `capacity - 1`
    /// UIDs are already unread or the next slot has not been released by
    /// its consumer yet. The rejected-put handler runs in both cases.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn put(&self, uid: u64) -> bool {
        let _guard = self.lock_puts();

        let current_tail = self.tail.load(Ordering::Acquire);
        let current_cursor = self.cursor.load(Ordering::Acquire);
        let distance = current_tail - current_cursor;
        if distance >= self.index_mask {
            self.rejected_put.reject_put(self, uid);
            return false;
        }

        let next_index = self.index(current_tail + 1);
        if self.flag(next_index) != SlotFlag::ReadyForPut {
            self.rejected_put.reject_put(self, uid);
            return false;
        }

        self.slots[next_index].store(uid, Ordering::Relaxed);
        self.flags[next_index].store(SlotFlag::ReadyForTake as u8, Ordering::Release);
        self.tail.store(current_tail + 1, Ordering::Release);
        true
    }

    /// Removes the oldest unread UID.
    ///
    /// Lock-free: concurrent callers race on `cursor`, and each sequence
    /// number is won by exactly one of them. The rejected-take handler runs
    /// before [`Take::Empty`] is returned.
    ///
    /// # Panics
    ///
    /// If the slot behind a successfully advanced cursor is not flagged
    /// [`SlotFlag::ReadyForTake`]. That means the bookkeeping is corrupt and
    /// the same UID could be handed out twice.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn take(&self) -> Take {
        let mut current = self.cursor.load(Ordering::Acquire);
        let next = loop {
            if current >= self.tail.load(Ordering::Acquire) {
                self.rejected_take.reject_take(self);
                return Take::Empty;
            }
            match self.cursor.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break current + 1,
                Err(actual) => {
                    if actual < current {
                        Self::cold_cursor_moved_back(current, actual);
                    }
                    current = actual;
                }
            }
        };

        let remaining = self.tail.load(Ordering::Acquire) - next;
        let needs_padding = remaining < self.padding_threshold as i64;

        let index = self.index(next);
        if self.flag(index) != SlotFlag::ReadyForTake {
            Self::cold_flag_mismatch(next, index);
        }
        let uid = self.slots[index].load(Ordering::Relaxed);
        self.flags[index].store(SlotFlag::ReadyForPut as u8, Ordering::Release);

        Take::Ready { uid, needs_padding }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Unread UIDs at the time of the call.
    pub fn len(&self) -> usize {
        let distance = self.tail() - self.cursor();
        usize::try_from(distance).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number of the last slot written, `-1` before the first put.
    pub fn tail(&self) -> i64 {
        self.tail.load(Ordering::Acquire)
    }

    /// Sequence number of the last slot taken, `-1` before the first take.
    pub fn cursor(&self) -> i64 {
        self.cursor.load(Ordering::Acquire)
    }

    pub const fn padding_threshold(&self) -> usize {
        self.padding_threshold
    }

    fn index(&self, sequence: i64) -> usize {
        (sequence & self.index_mask) as usize
    }

    fn flag(&self, index: usize) -> SlotFlag {
        SlotFlag::from_u8(self.flags[index].load(Ordering::Acquire))
    }

    // The lock guards no data, so a poisoned lock is still usable.
    fn lock_puts(&self) -> MutexGuard<'_, ()> {
        #[cfg(feature = "parking-lot")]
        {
            self.put_lock.lock()
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            self.put_lock.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_flag_mismatch(sequence: i64, index: usize) -> ! {
        #[cfg(feature = "tracing")]
        tracing::error!(sequence, index, "slot taken at cursor is not ready for take");
        panic!("ring buffer slot {index} (sequence {sequence}) is not ready for take")
    }

    #[cold]
    #[inline(never)]
    fn cold_cursor_moved_back(expected: i64, actual: i64) -> ! {
        panic!("ring buffer cursor moved back from {expected} to {actual}")
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("tail", &self.tail())
            .field("cursor", &self.cursor())
            .field("padding_threshold", &self.padding_threshold)
            .finish_non_exhaustive()
    }
}
