use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::AudioHandle;
use crate::exposure::PassSet;
use crate::models::{SegmentKey, Song};
use crate::timeline::Timeline;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    /// Audio acquired and ready, not advancing.
    Paused,
    Playing,
    Disposed,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub song_id: Option<String>,
    pub position_ms: u64,
    pub line_index: usize,
    pub segment_index: usize,
    /// Bumped on every song change or disposal; async results carrying an
    /// older generation are dropped.
    #[serde(skip)]
    pub generation: u64,
    #[serde(skip)]
    pub handle: Option<AudioHandle>,
    #[serde(skip)]
    song: Option<Arc<Song>>,
    #[serde(skip)]
    timeline: Timeline,
    #[serde(skip)]
    pass: PassSet,
    #[serde(skip)]
    views: HashMap<SegmentKey, u32>,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn song(&self) -> Option<&Arc<Song>> {
        self.song.as_ref()
    }

    pub fn pass(&self) -> &PassSet {
        &self.pass
    }

    /// Reset everything for a freshly selected song.
    pub fn begin_loading(&mut self, song: Arc<Song>) {
        let views = song.seed_views().collect();

        *self = Self {
            status: PlaybackStatus::Loading,
            song_id: Some(song.id.clone()),
            generation: self.generation.wrapping_add(1),
            timeline: Timeline::for_song(&song),
            song: Some(song),
            views,
            ..Self::default()
        };
    }

    /// Merge stored counts with the catalog seeds. Counts never go down, so
    /// the larger of the two is shown.
    pub fn apply_counts(&mut self, counts: HashMap<SegmentKey, u32>) {
        for (key, count) in counts {
            let views = self.views.entry(key).or_insert(0);
            *views = (*views).max(count);
        }
    }

    pub fn dispose(&mut self) {
        self.status = PlaybackStatus::Disposed;
        self.handle = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Move to `position_ms` during continuous playback.
    ///
    /// Indices are sticky: a timestamp outside every line, or in a gap between
    /// segments, keeps the previous index. Returns the segments of the active
    /// line that are audible now and have not been credited this pass.
    pub fn advance(&mut self, position_ms: u64) -> Vec<SegmentKey> {
        self.relocate(position_ms);

        let Some(song) = self.song.as_ref() else {
            return Vec::new();
        };
        let Some(line) = song.lines.get(self.line_index) else {
            return Vec::new();
        };

        let mut credited = Vec::new();
        for (segment_index, segment) in line.segments.iter().enumerate() {
            if !segment.contains(position_ms) {
                continue;
            }
            let key = SegmentKey::new(self.line_index, segment_index);
            if self.pass.record_if_new(key) {
                credited.push(key);
            }
        }
        credited
    }

    /// Jump to `position_ms`; everything becomes eligible for credit again.
    pub fn seek(&mut self, position_ms: u64) {
        self.pass.clear();
        self.timeline.reset();
        self.relocate(position_ms);
    }

    pub fn views(&self, key: SegmentKey) -> u32 {
        self.views.get(&key).copied().unwrap_or(0)
    }

    pub fn set_views(&mut self, key: SegmentKey, views: u32) {
        self.views.insert(key, views);
    }

    pub fn current_key(&self) -> Option<SegmentKey> {
        self.song.as_ref()?;
        Some(SegmentKey::new(self.line_index, self.segment_index))
    }

    fn relocate(&mut self, position_ms: u64) {
        self.position_ms = position_ms;
        let Some(song) = self.song.as_ref() else {
            return;
        };
        if let Some(location) = self.timeline.locate(song, position_ms) {
            self.line_index = location.line;
            if let Some(segment) = location.segment {
                self.segment_index = segment;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn kalinka_state() -> PlaybackState {
        let catalog = Catalog::bundled().expect("bundled catalog parses");
        let song = catalog.find("kalinka").expect("kalinka is bundled").clone();
        let mut state = PlaybackState::new();
        state.begin_loading(song);
        state
    }

    #[test]
    fn same_segment_across_ticks_is_credited_once() {
        let mut state = kalinka_state();
        assert_eq!(state.advance(6100), vec![SegmentKey::new(1, 0)]);
        assert!(state.advance(6200).is_empty());
        assert!(state.advance(6300).is_empty());

        state.seek(6000);
        assert_eq!(state.advance(6100), vec![SegmentKey::new(1, 0)]);
    }

    #[test]
    fn full_sweep_credits_every_segment_exactly_once() {
        let mut state = kalinka_state();
        let mut credited = Vec::new();
        for ts in (0..=12000).step_by(100) {
            credited.extend(state.advance(ts));
        }

        let song = state.song().cloned().expect("song loaded");
        let mut expected: Vec<_> = song.segment_keys().collect();
        credited.sort();
        expected.sort();
        assert_eq!(credited, expected);
        assert_eq!(credited.len(), 8);
    }

    #[test]
    fn indices_stick_when_no_line_matches() {
        let mut state = kalinka_state();
        state.advance(11500);
        assert_eq!((state.line_index, state.segment_index), (1, 4));

        assert!(state.advance(13000).is_empty());
        assert_eq!(state.position_ms, 13000);
        assert_eq!((state.line_index, state.segment_index), (1, 4));
    }

    #[test]
    fn shared_segment_boundary_credits_both_neighbours() {
        let mut state = kalinka_state();
        assert_eq!(
            state.advance(1500),
            vec![SegmentKey::new(0, 0), SegmentKey::new(0, 1)]
        );
        assert_eq!(state.segment_index, 0);
    }

    #[test]
    fn loading_a_song_resets_position_and_bumps_generation() {
        let mut state = kalinka_state();
        let generation = state.generation;
        state.advance(7000);
        state.set_views(SegmentKey::new(1, 0), 3);

        let song = state.song().cloned().expect("song loaded");
        state.begin_loading(song);
        assert_eq!(state.generation, generation + 1);
        assert_eq!(state.status, PlaybackStatus::Loading);
        assert_eq!((state.position_ms, state.line_index, state.segment_index), (0, 0, 0));
        assert!(state.pass().is_empty());
        assert_eq!(state.views(SegmentKey::new(1, 0)), 0);

        state.apply_counts(HashMap::from([(SegmentKey::new(1, 0), 12)]));
        assert_eq!(state.views(SegmentKey::new(1, 0)), 12);
    }

    #[test]
    fn stored_counts_never_lower_a_seeded_count() {
        let mut song = Catalog::bundled()
            .expect("bundled catalog parses")
            .find("kalinka")
            .expect("kalinka is bundled")
            .as_ref()
            .clone();
        song.lines[0].segments[1].views = 15;

        let mut state = PlaybackState::new();
        state.begin_loading(Arc::new(song));
        state.apply_counts(HashMap::from([
            (SegmentKey::new(0, 1), 3),
            (SegmentKey::new(0, 2), 4),
        ]));
        assert_eq!(state.views(SegmentKey::new(0, 1)), 15);
        assert_eq!(state.views(SegmentKey::new(0, 2)), 4);
    }
}
