pub mod analytics;
pub mod memory;
pub mod pass;
pub mod tracker;

use std::future::Future;

use anyhow::Result;

use crate::models::SegmentKey;

pub use analytics::{ExposureAnalytics, HeardSegment};
pub use memory::MemoryExposureStore;
pub use pass::PassSet;
pub use tracker::ExposureTracker;

/// Persistent view counts keyed by (song, segment position, viewer).
///
/// Writes are plain upserts; concurrent writers from different devices race
/// and the last write wins.
pub trait ExposureStore: Send + Sync + 'static {
    fn fetch_count(
        &self,
        song_id: &str,
        key: SegmentKey,
        viewer_id: &str,
    ) -> impl Future<Output = Result<Option<u32>>> + Send;

    fn upsert_count(
        &self,
        song_id: &str,
        key: SegmentKey,
        viewer_id: &str,
        count: u32,
    ) -> impl Future<Output = Result<()>> + Send;

    fn list_counts(
        &self,
        song_id: &str,
        viewer_id: &str,
    ) -> impl Future<Output = Result<Vec<(SegmentKey, u32)>>> + Send;
}
