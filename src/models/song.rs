use serde::{Deserialize, Serialize};

/// Granularity of the timed segments inside each line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Granularity {
    Word,
    #[default]
    Utterance,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Word => "word",
            Granularity::Utterance => "utterance",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Seed exposure count used until stored counts are loaded.
    #[serde(default)]
    pub views: u32,
}

impl Segment {
    pub fn contains(&self, timestamp_ms: u64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms <= self.end_ms
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub start_ms: u64,
    pub end_ms: u64,
    pub original: String,
    pub translation: String,
    pub segments: Vec<Segment>,
}

impl Line {
    pub fn contains(&self, timestamp_ms: u64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms <= self.end_ms
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub title: String,
    pub language: String,
    pub audio_file: String,
    #[serde(default)]
    pub granularity: Granularity,
    pub lines: Vec<Line>,
}

impl Song {
    pub fn segment(&self, key: SegmentKey) -> Option<&Segment> {
        self.lines
            .get(key.line)
            .and_then(|line| line.segments.get(key.segment))
    }

    pub fn segment_keys(&self) -> impl Iterator<Item = SegmentKey> + '_ {
        self.lines.iter().enumerate().flat_map(|(line, l)| {
            (0..l.segments.len()).map(move |segment| SegmentKey::new(line, segment))
        })
    }

    /// Catalog seed count for every segment, in song order.
    pub fn seed_views(&self) -> impl Iterator<Item = (SegmentKey, u32)> + '_ {
        self.lines.iter().enumerate().flat_map(|(line, l)| {
            l.segments
                .iter()
                .enumerate()
                .map(move |(segment, s)| (SegmentKey::new(line, segment), s.views))
        })
    }

    pub fn segment_count(&self) -> usize {
        self.lines.iter().map(|line| line.segments.len()).sum()
    }

    pub fn duration_ms(&self) -> u64 {
        self.lines.iter().map(|line| line.end_ms).max().unwrap_or(0)
    }

    /// Returns human-readable problems with the song's timing data.
    ///
    /// Ordering and containment are expectations, not hard rules, so callers
    /// only log these.
    pub fn timing_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut previous_line_start = 0u64;

        for (line_index, line) in self.lines.iter().enumerate() {
            if line.start_ms > line.end_ms {
                warnings.push(format!(
                    "line {line_index} starts after it ends ({} > {})",
                    line.start_ms, line.end_ms
                ));
            }
            if line.start_ms < previous_line_start {
                warnings.push(format!("line {line_index} is not sorted by start time"));
            }
            previous_line_start = line.start_ms;

            let mut previous_segment_end = line.start_ms;
            for (segment_index, segment) in line.segments.iter().enumerate() {
                if segment.start_ms > segment.end_ms {
                    warnings.push(format!(
                        "segment {line_index}:{segment_index} starts after it ends"
                    ));
                }
                if segment.start_ms < line.start_ms || segment.end_ms > line.end_ms {
                    warnings.push(format!(
                        "segment {line_index}:{segment_index} falls outside its line"
                    ));
                }
                if segment.start_ms < previous_segment_end {
                    warnings.push(format!(
                        "segment {line_index}:{segment_index} overlaps the previous segment"
                    ));
                }
                previous_segment_end = segment.end_ms;
            }
        }

        warnings
    }
}

/// Position of a segment inside a song. Stable when the same text repeats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct SegmentKey {
    pub line: usize,
    pub segment: usize,
}

impl SegmentKey {
    pub fn new(line: usize, segment: usize) -> Self {
        Self { line, segment }
    }
}

impl std::fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str, start_ms: u64, end_ms: u64) -> Segment {
        Segment {
            text: text.into(),
            start_ms,
            end_ms,
            views: 0,
        }
    }

    #[test]
    fn segment_keys_walk_lines_in_order() {
        let song = Song {
            id: "s".into(),
            title: "S".into(),
            language: "x".into(),
            audio_file: "s.mp3".into(),
            granularity: Granularity::Word,
            lines: vec![
                Line {
                    start_ms: 0,
                    end_ms: 10,
                    original: "a b".into(),
                    translation: String::new(),
                    segments: vec![segment("a", 0, 5), segment("b", 5, 10)],
                },
                Line {
                    start_ms: 10,
                    end_ms: 20,
                    original: "a".into(),
                    translation: String::new(),
                    segments: vec![segment("a", 10, 20)],
                },
            ],
        };

        let keys: Vec<_> = song.segment_keys().collect();
        assert_eq!(
            keys,
            vec![SegmentKey::new(0, 0), SegmentKey::new(0, 1), SegmentKey::new(1, 0)]
        );
        assert_eq!(song.segment_count(), 3);
        assert_eq!(song.duration_ms(), 20);
        assert_eq!(song.segment(SegmentKey::new(1, 0)).map(|s| s.text.as_str()), Some("a"));
        assert!(song.segment(SegmentKey::new(2, 0)).is_none());
        assert!(song.timing_warnings().is_empty());
    }

    #[test]
    fn timing_warnings_flag_inverted_and_escaping_segments() {
        let song = Song {
            id: "bad".into(),
            title: "Bad".into(),
            language: "x".into(),
            audio_file: "bad.mp3".into(),
            granularity: Granularity::Utterance,
            lines: vec![Line {
                start_ms: 100,
                end_ms: 50,
                original: String::new(),
                translation: String::new(),
                segments: vec![segment("late", 90, 200)],
            }],
        };

        let warnings = song.timing_warnings();
        assert!(warnings.iter().any(|w| w.contains("starts after it ends")));
        assert!(warnings.iter().any(|w| w.contains("outside its line")));
    }

    #[test]
    fn closed_intervals_include_both_ends() {
        let s = segment("x", 100, 200);
        assert!(s.contains(100));
        assert!(s.contains(200));
        assert!(!s.contains(99));
        assert!(!s.contains(201));
    }
}
