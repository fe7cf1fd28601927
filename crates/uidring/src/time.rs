use chrono::NaiveDate;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

/// Default epoch: Friday, May 20, 2016 00:00:00 UTC, in Unix seconds.
pub const DEFAULT_EPOCH: i64 = 1_463_702_400;

/// The default epoch as a `YYYY-MM-DD` string.
pub const DEFAULT_EPOCH_STR: &str = "2016-05-20";

/// A trait for time sources that return the current wall-clock second.
///
/// This abstraction allows you to plug in the real system clock or a mocked
/// time source in tests.
///
/// The value is **seconds since the Unix epoch**, not relative to the
/// generator epoch. Generators subtract their own epoch.
///
/// # Example
///
/// ```
/// use uidring::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_secs(&self) -> i64 {
///         1_463_702_500
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_secs(), 1_463_702_500);
/// ```
pub trait TimeSource {
    /// Returns the current time in whole seconds since the Unix epoch.
    fn current_secs(&self) -> i64;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_secs(&self) -> i64 {
        (**self).current_secs()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn current_secs(&self) -> i64 {
        (**self).current_secs()
    }
}

/// A time source backed by [`SystemTime::now`].
///
/// Wall-clock corrections (NTP) are visible through this clock; the sequencer
/// reports them as [`Error::ClockRolledBack`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_secs(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            // A clock before 1970 reads as negative seconds.
            Err(e) => -(e.duration().as_secs() as i64),
        }
    }
}

/// Parses a `YYYY-MM-DD` date into Unix seconds at midnight UTC.
///
/// # Errors
///
/// Returns [`Error::InvalidEpoch`] if the string is not a valid date.
///
/// # Example
///
/// ```
/// use uidring::{parse_epoch, DEFAULT_EPOCH};
///
/// assert_eq!(parse_epoch("2016-05-20").unwrap(), DEFAULT_EPOCH);
/// assert!(parse_epoch("20-05-2016").is_err());
/// ```
pub fn parse_epoch(epoch: &str) -> Result<i64> {
    let date = NaiveDate::parse_from_str(epoch, "%Y-%m-%d")
        .map_err(|_| Error::InvalidEpoch(epoch.to_owned()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::InvalidEpoch(epoch.to_owned()))?;
    Ok(midnight.and_utc().timestamp())
}
