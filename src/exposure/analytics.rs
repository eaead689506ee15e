use std::collections::HashMap;

use serde::Serialize;

use crate::models::{SegmentKey, Song};

const RANKING_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeardSegment {
    pub key: SegmentKey,
    pub text: String,
    pub views: u32,
}

/// Listening summary for one viewer and song.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExposureAnalytics {
    pub tracked_segments: usize,
    pub most_heard: Vec<HeardSegment>,
    pub least_heard: Vec<HeardSegment>,
    pub average_views: f64,
}

impl ExposureAnalytics {
    /// Builds the summary from stored counts. Counts for positions that no
    /// longer exist in the song are ignored.
    pub fn from_counts(song: &Song, counts: &HashMap<SegmentKey, u32>) -> Self {
        let mut heard: Vec<HeardSegment> = counts
            .iter()
            .filter_map(|(key, views)| {
                song.segment(*key).map(|segment| HeardSegment {
                    key: *key,
                    text: segment.text.clone(),
                    views: *views,
                })
            })
            .collect();

        // Ties resolve in song order so rankings are stable.
        heard.sort_by(|a, b| b.views.cmp(&a.views).then(a.key.cmp(&b.key)));
        let most_heard = heard.iter().take(RANKING_SIZE).cloned().collect();

        heard.sort_by(|a, b| a.views.cmp(&b.views).then(a.key.cmp(&b.key)));
        let least_heard = heard.iter().take(RANKING_SIZE).cloned().collect();

        let total: u64 = heard.iter().map(|h| u64::from(h.views)).sum();
        let average_views = if heard.is_empty() {
            0.0
        } else {
            total as f64 / heard.len() as f64
        };

        Self {
            tracked_segments: heard.len(),
            most_heard,
            least_heard,
            average_views,
        }
    }
}
