use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::models::SegmentKey;

use super::ExposureStore;

type RecordKey = (String, SegmentKey, String);

/// Process-local store, used for offline sessions and as a test double.
#[derive(Debug, Default)]
pub struct MemoryExposureStore {
    counts: Mutex<HashMap<RecordKey, u32>>,
}

impl MemoryExposureStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_counts<T>(&self, f: impl FnOnce(&mut HashMap<RecordKey, u32>) -> T) -> Result<T> {
        let mut guard = self
            .counts
            .lock()
            .map_err(|_| anyhow!("exposure store lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

impl ExposureStore for MemoryExposureStore {
    async fn fetch_count(
        &self,
        song_id: &str,
        key: SegmentKey,
        viewer_id: &str,
    ) -> Result<Option<u32>> {
        let record = (song_id.to_string(), key, viewer_id.to_string());
        self.with_counts(|counts| counts.get(&record).copied())
    }

    async fn upsert_count(
        &self,
        song_id: &str,
        key: SegmentKey,
        viewer_id: &str,
        count: u32,
    ) -> Result<()> {
        let record = (song_id.to_string(), key, viewer_id.to_string());
        self.with_counts(|counts| {
            counts.insert(record, count);
        })
    }

    async fn list_counts(&self, song_id: &str, viewer_id: &str) -> Result<Vec<(SegmentKey, u32)>> {
        self.with_counts(|counts| {
            let mut listed: Vec<_> = counts
                .iter()
                .filter(|((song, _, viewer), _)| song == song_id && viewer == viewer_id)
                .map(|((_, key, _), count)| (*key, *count))
                .collect();
            listed.sort();
            listed
        })
    }
}
