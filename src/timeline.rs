//! Maps a playback timestamp to the active line and segment.
//!
//! Lines and segments use closed `[start, end]` intervals, so a timestamp on a
//! shared boundary matches two neighbours. The first match in array order
//! wins: at the end of line N / start of line N+1, line N is active.

use serde::Serialize;

use crate::models::{Line, Song};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub line: usize,
    /// `None` when the timestamp falls in a gap between the line's segments.
    pub segment: Option<usize>,
}

/// Linear first-match search over every line.
pub fn locate(song: &Song, timestamp_ms: u64) -> Option<Location> {
    song.lines
        .iter()
        .position(|line| line.contains(timestamp_ms))
        .map(|line| location_in(song, line, timestamp_ms))
}

fn location_in(song: &Song, line_index: usize, timestamp_ms: u64) -> Location {
    let segment = song.lines[line_index]
        .segments
        .iter()
        .position(|segment| segment.contains(timestamp_ms));
    Location {
        line: line_index,
        segment,
    }
}

/// Indexer with a cursor on the last matched line.
///
/// Timestamps advance monotonically during playback, so the cursor line or the
/// one after it usually matches. The shortcut is only taken when the song's
/// lines are sorted and non-overlapping; otherwise every call does a full scan.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    cursor: Option<usize>,
    ordered: bool,
}

impl Timeline {
    pub fn for_song(song: &Song) -> Self {
        Self {
            cursor: None,
            ordered: lines_are_ordered(&song.lines),
        }
    }

    pub fn locate(&mut self, song: &Song, timestamp_ms: u64) -> Option<Location> {
        if self.ordered {
            if let Some(line) = self.near_cursor(song, timestamp_ms) {
                self.cursor = Some(line);
                return Some(location_in(song, line, timestamp_ms));
            }
        }

        let found = locate(song, timestamp_ms);
        if let Some(location) = found {
            self.cursor = Some(location.line);
        }
        found
    }

    /// Forget the cursor, e.g. after a seek.
    pub fn reset(&mut self) {
        self.cursor = None;
    }

    fn near_cursor(&self, song: &Song, timestamp_ms: u64) -> Option<usize> {
        let cursor = self.cursor?;
        [cursor, cursor + 1].into_iter().find(|&index| {
            let Some(line) = song.lines.get(index) else {
                return false;
            };
            // An earlier neighbour sharing the boundary takes precedence.
            let earlier_matches = index
                .checked_sub(1)
                .and_then(|prev| song.lines.get(prev))
                .is_some_and(|prev| prev.contains(timestamp_ms));
            line.contains(timestamp_ms) && !earlier_matches
        })
    }
}

fn lines_are_ordered(lines: &[Line]) -> bool {
    lines.iter().all(|line| line.start_ms <= line.end_ms)
        && lines.windows(2).all(|pair| pair[0].end_ms <= pair[1].start_ms)
}
