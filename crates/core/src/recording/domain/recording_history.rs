use thiserror::Error;

use super::recording_record::RecordingRecord;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage contents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Bounded, persisted list of saved recordings, oldest first.
pub trait RecordingHistory: Send {
    fn records(&self) -> Result<Vec<RecordingRecord>, PersistenceError>;

    fn append(&mut self, record: RecordingRecord) -> Result<(), PersistenceError>;
}

/// Appends `record` and keeps only the newest `limit` entries.
pub fn append_capped(records: &mut Vec<RecordingRecord>, record: RecordingRecord, limit: usize) {
    records.push(record);
    if records.len() > limit {
        let excess = records.len() - limit;
        records.drain(..excess);
    }
}
