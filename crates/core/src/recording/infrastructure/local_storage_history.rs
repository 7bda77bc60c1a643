use crate::recording::domain::recording_history::{
    append_capped, PersistenceError, RecordingHistory,
};
use crate::recording::domain::recording_record::RecordingRecord;
use crate::shared::constants::{HISTORY_LIMIT, HISTORY_STORAGE_KEY};

use super::json_key_value_store::JsonKeyValueStore;

/// Recording history kept as a JSON-encoded array under one store key.
pub struct LocalStorageHistory {
    store: JsonKeyValueStore,
    limit: usize,
}

impl LocalStorageHistory {
    pub fn new(store: JsonKeyValueStore) -> Self {
        Self {
            store,
            limit: HISTORY_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

impl RecordingHistory for LocalStorageHistory {
    fn records(&self) -> Result<Vec<RecordingRecord>, PersistenceError> {
        match self.store.get(HISTORY_STORAGE_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn append(&mut self, record: RecordingRecord) -> Result<(), PersistenceError> {
        let mut records = self.records()?;
        append_capped(&mut records, record, self.limit);
        self.store
            .set(HISTORY_STORAGE_KEY, &serde_json::to_string(&records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(n: i64) -> RecordingRecord {
        RecordingRecord {
            id: format!("video-{n}"),
            filename: format!("face-tracking-{n}.webm"),
            timestamp: n,
            size: 100,
        }
    }

    fn history(dir: &TempDir) -> LocalStorageHistory {
        LocalStorageHistory::new(JsonKeyValueStore::new(dir.path().join("storage.json")))
    }

    #[test]
    fn test_empty_history() {
        let dir = TempDir::new().unwrap();
        assert!(history(&dir).records().unwrap().is_empty());
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = TempDir::new().unwrap();
        history(&dir).append(record(1)).unwrap();
        history(&dir).append(record(2)).unwrap();
        assert_eq!(history(&dir).records().unwrap(), vec![record(1), record(2)]);
    }

    #[test]
    fn test_persisted_history_is_capped_at_ten() {
        let dir = TempDir::new().unwrap();
        let mut h = history(&dir);
        for n in 1..=11 {
            h.append(record(n)).unwrap();
        }
        let store = JsonKeyValueStore::new(dir.path().join("storage.json"));
        let raw = store.get(HISTORY_STORAGE_KEY).unwrap().unwrap();
        let stored: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 10);
        assert_eq!(stored[0]["id"], "video-2");
        assert_eq!(stored[9]["filename"], "face-tracking-11.webm");
    }

    #[test]
    fn test_corrupt_history_fails_append() {
        let dir = TempDir::new().unwrap();
        let store = JsonKeyValueStore::new(dir.path().join("storage.json"));
        store.set(HISTORY_STORAGE_KEY, "not an array").unwrap();
        let mut h = LocalStorageHistory::new(store);
        assert!(matches!(h.append(record(1)), Err(PersistenceError::Json(_))));
    }
}
