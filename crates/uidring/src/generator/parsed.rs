use chrono::{DateTime, Utc};
use core::fmt;
use serde::Serialize;

use crate::{BitLayout, UidParts};

/// A UID decoded back into wall-clock time, worker ID and sequence.
///
/// `Display` renders the JSON form:
///
/// ```text
/// {"UID":3435973877761,"timestamp":"2016-05-20T00:01:40Z","workerId":5,"sequence":1}
/// ```
///
/// Wide timestamp fields can encode seconds past what a calendar date can
/// hold. `timestamp` is then `None` (JSON `null`) and only `delta_seconds`
/// is meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ParsedUid {
    #[serde(rename = "UID")]
    pub uid: u64,
    /// Seconds since the generator epoch, as encoded.
    #[serde(skip)]
    pub delta_seconds: u64,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "workerId")]
    pub worker_id: u64,
    pub sequence: u64,
}

impl ParsedUid {
    /// Decodes `uid` using the layout and epoch that produced it.
    pub fn decode(layout: &BitLayout, epoch_seconds: i64, uid: u64) -> Self {
        let UidParts {
            delta_seconds,
            worker_id,
            sequence,
        } = layout.parse(uid);
        let timestamp = i64::try_from(delta_seconds)
            .ok()
            .and_then(|delta| epoch_seconds.checked_add(delta))
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        Self {
            uid,
            delta_seconds,
            timestamp,
            worker_id,
            sequence,
        }
    }
}

impl fmt::Display for ParsedUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
