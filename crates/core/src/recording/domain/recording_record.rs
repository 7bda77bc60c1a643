use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::constants::{RECORDING_FILE_EXTENSION, RECORDING_FILE_PREFIX};

/// History entry for one saved recording.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingRecord {
    pub id: String,
    pub filename: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Bytes.
    pub size: u64,
}

impl RecordingRecord {
    pub fn new(at: DateTime<Utc>, size: u64) -> Self {
        let timestamp = at.timestamp_millis();
        Self {
            id: format!("video-{timestamp}"),
            filename: recording_filename(at),
            timestamp,
            size,
        }
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// `face-tracking-2024-05-01T12:30:00.123Z.webm`
pub fn recording_filename(at: DateTime<Utc>) -> String {
    format!(
        "{RECORDING_FILE_PREFIX}{}.{RECORDING_FILE_EXTENSION}",
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}
