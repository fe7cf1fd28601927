use serde::{Deserialize, Serialize};

use crate::{BitLayout, DEFAULT_EPOCH_STR, Error, Result, parse_epoch};

/// Settings shared by [`DefaultUidGenerator`] and [`CachedUidGenerator`].
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use uidring::GeneratorConfig;
///
/// let config: GeneratorConfig = serde_json::from_str(r#"{"boost_power": 2}"#).unwrap();
/// assert_eq!(config.boost_power, 2);
/// assert_eq!(config.sequence_bits, 13);
/// assert_eq!(config.buffer_size().unwrap(), 8192 << 2);
/// ```
///
/// [`DefaultUidGenerator`]: crate::DefaultUidGenerator
/// [`CachedUidGenerator`]: crate::CachedUidGenerator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub timestamp_bits: u8,
    pub worker_id_bits: u8,
    pub sequence_bits: u8,
    /// Generator epoch as `YYYY-MM-DD` (midnight UTC).
    pub epoch: String,
    /// The cached ring holds `(max_sequence + 1) << boost_power` slots.
    pub boost_power: u8,
    /// Refill once fewer than `padding_factor` percent of the slots are
    /// unread.
    pub padding_factor: u8,
    /// Also refill every this many seconds from a background thread.
    pub schedule_interval: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            timestamp_bits: 28,
            worker_id_bits: 22,
            sequence_bits: 13,
            epoch: DEFAULT_EPOCH_STR.to_string(),
            boost_power: 3,
            padding_factor: 50,
            schedule_interval: None,
        }
    }
}

impl GeneratorConfig {
    /// # Errors
    ///
    /// [`Error::InvalidLayout`] if the bit counts do not add up to 63.
    pub fn layout(&self) -> Result<BitLayout> {
        BitLayout::new(self.timestamp_bits, self.worker_id_bits, self.sequence_bits)
    }

    /// # Errors
    ///
    /// [`Error::InvalidEpoch`] if `epoch` is not a `YYYY-MM-DD` date.
    pub fn epoch_seconds(&self) -> Result<i64> {
        parse_epoch(&self.epoch)
    }

    /// Slot count of the cached ring buffer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLayout`] for a bad layout, or
    /// [`Error::InvalidCapacity`] if the size does not fit in `usize`.
    pub fn buffer_size(&self) -> Result<usize> {
        let layout = self.layout()?;
        if self.boost_power >= 64 {
            return Err(Error::InvalidCapacity(usize::MAX));
        }
        // At most 2^63 << 63, so this cannot overflow.
        let size = (u128::from(layout.max_sequence()) + 1) << self.boost_power;
        usize::try_from(size).map_err(|_| Error::InvalidCapacity(usize::MAX))
    }

    /// # Errors
    ///
    /// [`Error::InvalidPaddingFactor`] if above 100.
    pub fn checked_padding_factor(&self) -> Result<u8> {
        if self.padding_factor > 100 {
            return Err(Error::InvalidPaddingFactor(self.padding_factor));
        }
        Ok(self.padding_factor)
    }
}
