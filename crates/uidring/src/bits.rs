use crate::{Error, Result};

/// Total number of bits in a packed UID, sign bit included.
pub const TOTAL_BITS: u8 = 64;

/// The sign bit is reserved and always zero so UIDs stay positive as `i64`.
pub const SIGN_BITS: u8 = 1;

/// Partition of a 64-bit UID into timestamp, worker ID and sequence fields.
///
/// The default layout is (28, 22, 13):
///
/// ```text
///  Bit Index:  63           63 62            35 34             13 12             0
///              +--------------+----------------+-----------------+---------------+
///  Field:      |   sign (1)   | delta secs (28)|  worker ID (22) | sequence (13) |
///              +--------------+----------------+-----------------+---------------+
///              |<----------- MSB ---------- 64 bits ----------- LSB ------------>|
/// ```
///
/// That is roughly 8.7 years of seconds past the epoch, about 4.19M worker
/// slots and 8192 UIDs per second per worker.
///
/// A layout is immutable once built and is usually shared behind an
/// [`Arc`](std::sync::Arc) by every generator using it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitLayout {
    timestamp_bits: u8,
    worker_id_bits: u8,
    sequence_bits: u8,

    max_delta_seconds: u64,
    max_worker_id: u64,
    max_sequence: u64,

    timestamp_shift: u8,
    worker_id_shift: u8,
}

/// The three unpacked fields of a UID.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UidParts {
    /// Seconds elapsed since the generator epoch.
    pub delta_seconds: u64,
    pub worker_id: u64,
    pub sequence: u64,
}

impl Default for BitLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitLayout {
    /// The (28, 22, 13) layout.
    pub const DEFAULT: Self = Self::new_unchecked(28, 22, 13);

    /// Builds a layout, checking that `1 + timestamp + worker_id + sequence`
    /// adds up to 64 bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLayout`] if the bit counts do not add up.
    ///
    /// # Example
    ///
    /// ```
    /// use uidring::BitLayout;
    ///
    /// let layout = BitLayout::new(31, 23, 9).unwrap();
    /// assert_eq!(layout.max_sequence(), 511);
    /// assert!(BitLayout::new(28, 22, 14).is_err());
    /// ```
    pub fn new(timestamp_bits: u8, worker_id_bits: u8, sequence_bits: u8) -> Result<Self> {
        let total = u16::from(SIGN_BITS)
            + u16::from(timestamp_bits)
            + u16::from(worker_id_bits)
            + u16::from(sequence_bits);
        if total != u16::from(TOTAL_BITS) {
            return Err(Error::InvalidLayout {
                timestamp_bits,
                worker_id_bits,
                sequence_bits,
            });
        }
        Ok(Self::new_unchecked(
            timestamp_bits,
            worker_id_bits,
            sequence_bits,
        ))
    }

    const fn new_unchecked(timestamp_bits: u8, worker_id_bits: u8, sequence_bits: u8) -> Self {
        Self {
            timestamp_bits,
            worker_id_bits,
            sequence_bits,
            max_delta_seconds: max_value(timestamp_bits),
            max_worker_id: max_value(worker_id_bits),
            max_sequence: max_value(sequence_bits),
            timestamp_shift: worker_id_bits + sequence_bits,
            worker_id_shift: sequence_bits,
        }
    }

    /// Packs the three fields into one UID.
    ///
    /// No bounds checking is done here; callers keep every field within its
    /// `max_*` value.
    #[inline]
    pub const fn allocate(&self, delta_seconds: u64, worker_id: u64, sequence: u64) -> u64 {
        (delta_seconds << self.timestamp_shift) | (worker_id << self.worker_id_shift) | sequence
    }

    /// Unpacks a UID built by [`Self::allocate`] with this layout.
    ///
    /// # Example
    ///
    /// ```
    /// use uidring::{BitLayout, UidParts};
    ///
    /// let layout = BitLayout::default();
    /// let uid = layout.allocate(100, 5, 1);
    /// assert_eq!(
    ///     layout.parse(uid),
    ///     UidParts { delta_seconds: 100, worker_id: 5, sequence: 1 }
    /// );
    /// ```
    #[inline]
    pub const fn parse(&self, uid: u64) -> UidParts {
        UidParts {
            delta_seconds: (uid >> self.timestamp_shift) & self.max_delta_seconds,
            worker_id: (uid >> self.worker_id_shift) & self.max_worker_id,
            sequence: uid & self.max_sequence,
        }
    }

    pub const fn timestamp_bits(&self) -> u8 {
        self.timestamp_bits
    }

    pub const fn worker_id_bits(&self) -> u8 {
        self.worker_id_bits
    }

    pub const fn sequence_bits(&self) -> u8 {
        self.sequence_bits
    }

    /// Largest representable number of seconds past the epoch.
    pub const fn max_delta_seconds(&self) -> u64 {
        self.max_delta_seconds
    }

    pub const fn max_worker_id(&self) -> u64 {
        self.max_worker_id
    }

    pub const fn max_sequence(&self) -> u64 {
        self.max_sequence
    }

    pub const fn timestamp_shift(&self) -> u8 {
        self.timestamp_shift
    }

    pub const fn worker_id_shift(&self) -> u8 {
        self.worker_id_shift
    }
}

const fn max_value(bits: u8) -> u64 {
    if bits >= 64 { u64::MAX } else { (1 << bits) - 1 }
}
