use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use crate::models::{SegmentKey, Song};

use super::analytics::ExposureAnalytics;
use super::ExposureStore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

type RecordKey = (String, SegmentKey, String);

/// Fail-soft front end over an [`ExposureStore`].
///
/// None of the methods return errors: reads fail open to "nothing heard yet"
/// and failed writes report the last count the tracker knows about.
pub struct ExposureTracker<S> {
    store: Arc<S>,
    known: Mutex<HashMap<RecordKey, u32>>,
    record_locks: Mutex<HashMap<RecordKey, Arc<AsyncMutex<()>>>>,
}

impl<S: ExposureStore> ExposureTracker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            known: Mutex::new(HashMap::new()),
            record_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Read, increment and write back the count for one segment.
    ///
    /// The increment starts from the larger of the stored count and the count
    /// already known for the record (loaded or seeded), so counts never go
    /// down. Increments for the same record are serialized; increments for
    /// different records run concurrently.
    pub async fn persist_increment(&self, song_id: &str, key: SegmentKey, viewer_id: &str) -> u32 {
        let record = (song_id.to_string(), key, viewer_id.to_string());
        let lock = self.record_lock(&record);
        let count = {
            let _serialized = lock.lock().await;
            self.increment(&record).await
        };
        drop(lock);
        self.prune_lock(&record);
        count
    }

    /// Raise the known counts for a song to at least `seeds`, e.g. the seed
    /// values shipped with the catalog.
    pub fn seed_counts(
        &self,
        song_id: &str,
        viewer_id: &str,
        seeds: impl IntoIterator<Item = (SegmentKey, u32)>,
    ) {
        let mut known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, seed) in seeds {
            let count = known
                .entry((song_id.to_string(), key, viewer_id.to_string()))
                .or_insert(0);
            *count = (*count).max(seed);
        }
    }

    async fn increment(&self, record: &RecordKey) -> u32 {
        let (song_id, key, viewer_id) = (record.0.as_str(), record.1, record.2.as_str());
        let known = self.known_count(record);

        let current = match self.store.fetch_count(song_id, key, viewer_id).await {
            Ok(count) => count.unwrap_or(0).max(known),
            Err(err) => {
                log_error!("failed to fetch exposure count for {song_id} {key}: {err:#}");
                return known;
            }
        };

        let next = current.saturating_add(1);
        if let Err(err) = self.store.upsert_count(song_id, key, viewer_id, next).await {
            log_error!("failed to store exposure count for {song_id} {key}: {err:#}");
            self.remember(record.clone(), current);
            return current;
        }

        self.remember(record.clone(), next);
        next
    }

    /// Stored counts for every tracked segment of a song.
    pub async fn load_counts(&self, song_id: &str, viewer_id: &str) -> HashMap<SegmentKey, u32> {
        match self.store.list_counts(song_id, viewer_id).await {
            Ok(listed) => {
                let counts: HashMap<_, _> = listed.into_iter().collect();
                self.seed_counts(song_id, viewer_id, counts.iter().map(|(k, c)| (*k, *c)));
                log_info!("loaded {} exposure counts for {song_id}", counts.len());
                counts
            }
            Err(err) => {
                log_error!("failed to load exposure counts for {song_id}: {err:#}");
                HashMap::new()
            }
        }
    }

    pub async fn analytics(&self, song: &Song, viewer_id: &str) -> ExposureAnalytics {
        let counts = self.load_counts(&song.id, viewer_id).await;
        ExposureAnalytics::from_counts(song, &counts)
    }

    fn known_count(&self, record: &RecordKey) -> u32 {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(record)
            .copied()
            .unwrap_or(0)
    }

    fn remember(&self, record: RecordKey, count: u32) {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record, count);
    }

    /// Drop the lock for `record` once no increment holds or awaits it.
    fn prune_lock(&self, record: &RecordKey) {
        let mut locks = self.record_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(record)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(record);
        }
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.record_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn record_lock(&self, record: &RecordKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.record_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(record.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use anyhow::{bail, Result};

    use super::*;
    use crate::exposure::MemoryExposureStore;

    /// Memory store with switchable read/write failures.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryExposureStore,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        writes: AtomicUsize,
    }

    impl ExposureStore for FlakyStore {
        async fn fetch_count(&self, song_id: &str, key: SegmentKey, viewer_id: &str) -> Result<Option<u32>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                bail!("store unreachable");
            }
            self.inner.fetch_count(song_id, key, viewer_id).await
        }

        async fn upsert_count(
            &self,
            song_id: &str,
            key: SegmentKey,
            viewer_id: &str,
            count: u32,
        ) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                bail!("write rejected");
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.upsert_count(song_id, key, viewer_id, count).await
        }

        async fn list_counts(&self, song_id: &str, viewer_id: &str) -> Result<Vec<(SegmentKey, u32)>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                bail!("store unreachable");
            }
            self.inner.list_counts(song_id, viewer_id).await
        }
    }

    const SONG: &str = "kalinka";
    const VIEWER: &str = "anonymous";

    #[tokio::test]
    async fn increment_round_trips_through_the_store() {
        let store = Arc::new(MemoryExposureStore::new());
        let tracker = ExposureTracker::new(store.clone());
        let key = SegmentKey::new(1, 3);

        assert_eq!(tracker.persist_increment(SONG, key, VIEWER).await, 1);
        assert_eq!(tracker.persist_increment(SONG, key, VIEWER).await, 2);
        assert_eq!(store.fetch_count(SONG, key, VIEWER).await.unwrap(), Some(2));
        assert_eq!(store.fetch_count(SONG, key, "someone-else").await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_write_returns_the_pre_failure_count() {
        let store = Arc::new(FlakyStore::default());
        let tracker = ExposureTracker::new(store.clone());
        let key = SegmentKey::new(0, 0);

        assert_eq!(tracker.persist_increment(SONG, key, VIEWER).await, 1);
        store.fail_writes.store(true, Ordering::SeqCst);
        assert_eq!(tracker.persist_increment(SONG, key, VIEWER).await, 1);
        assert_eq!(store.inner.fetch_count(SONG, key, VIEWER).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn failed_read_returns_last_known_count_or_zero() {
        let store = Arc::new(FlakyStore::default());
        let tracker = ExposureTracker::new(store.clone());
        let heard = SegmentKey::new(0, 1);
        let unheard = SegmentKey::new(0, 2);

        tracker.persist_increment(SONG, heard, VIEWER).await;
        tracker.persist_increment(SONG, heard, VIEWER).await;
        store.fail_reads.store(true, Ordering::SeqCst);

        assert_eq!(tracker.persist_increment(SONG, heard, VIEWER).await, 2);
        assert_eq!(tracker.persist_increment(SONG, unheard, VIEWER).await, 0);
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn load_failure_fails_open_to_empty() {
        let store = Arc::new(FlakyStore::default());
        let tracker = ExposureTracker::new(store.clone());
        tracker.persist_increment(SONG, SegmentKey::new(0, 0), VIEWER).await;

        assert_eq!(tracker.load_counts(SONG, VIEWER).await.len(), 1);
        store.fail_reads.store(true, Ordering::SeqCst);
        assert!(tracker.load_counts(SONG, VIEWER).await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_increments_for_one_record_do_not_lose_updates() {
        let store = Arc::new(MemoryExposureStore::new());
        let tracker = Arc::new(ExposureTracker::new(store.clone()));
        let key = SegmentKey::new(0, 0);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            tasks.spawn(async move { tracker.persist_increment(SONG, key, VIEWER).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.expect("increment task panicked");
        }

        assert_eq!(store.fetch_count(SONG, key, VIEWER).await.unwrap(), Some(8));
        assert_eq!(tracker.lock_count(), 0);
    }

    #[tokio::test]
    async fn seeded_counts_are_the_floor_for_increments() {
        let store = Arc::new(MemoryExposureStore::new());
        let tracker = ExposureTracker::new(store.clone());
        let seeded = SegmentKey::new(0, 1);
        let stored = SegmentKey::new(0, 2);
        store.upsert_count(SONG, stored, VIEWER, 30).await.unwrap();

        tracker.seed_counts(SONG, VIEWER, [(seeded, 15), (stored, 12)]);

        assert_eq!(tracker.persist_increment(SONG, seeded, VIEWER).await, 16);
        assert_eq!(tracker.persist_increment(SONG, stored, VIEWER).await, 31);
        assert_eq!(store.fetch_count(SONG, seeded, VIEWER).await.unwrap(), Some(16));
    }

    #[tokio::test]
    async fn seeds_for_one_viewer_do_not_leak_to_another() {
        let store = Arc::new(MemoryExposureStore::new());
        let tracker = ExposureTracker::new(store);
        let key = SegmentKey::new(1, 0);

        tracker.seed_counts(SONG, VIEWER, [(key, 15)]);
        assert_eq!(tracker.persist_increment(SONG, key, "learner-7").await, 1);
        assert_eq!(tracker.lock_count(), 0);
    }
}
