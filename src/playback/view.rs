use serde::Serialize;

use crate::fade::FadeStyle;
use crate::models::{Granularity, SegmentKey};

use super::state::PlaybackState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentView {
    pub key: SegmentKey,
    pub text: String,
    pub views: u32,
    pub fade: FadeStyle,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineView {
    pub original: String,
    pub translation: String,
    pub is_current: bool,
    pub segments: Vec<SegmentView>,
}

/// Everything a renderer needs to paint the player.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub title: Option<String>,
    pub language: Option<String>,
    pub granularity: Option<Granularity>,
    pub lines: Vec<LineView>,
}

impl PlaybackSnapshot {
    pub fn from_state(state: &PlaybackState) -> Self {
        let Some(song) = state.song() else {
            return Self {
                state: state.clone(),
                title: None,
                language: None,
                granularity: None,
                lines: Vec::new(),
            };
        };

        let current = state.current_key();
        let lines = song
            .lines
            .iter()
            .enumerate()
            .map(|(line_index, line)| LineView {
                original: line.original.clone(),
                translation: line.translation.clone(),
                is_current: line_index == state.line_index,
                segments: line
                    .segments
                    .iter()
                    .enumerate()
                    .map(|(segment_index, segment)| {
                        let key = SegmentKey::new(line_index, segment_index);
                        let views = state.views(key);
                        SegmentView {
                            key,
                            text: segment.text.clone(),
                            views,
                            fade: FadeStyle::for_views(views),
                            is_current: current == Some(key),
                        }
                    })
                    .collect(),
            })
            .collect();

        Self {
            state: state.clone(),
            title: Some(song.title.clone()),
            language: Some(song.language.clone()),
            granularity: Some(song.granularity),
            lines,
        }
    }

    pub fn current_line(&self) -> Option<&LineView> {
        self.lines.iter().find(|line| line.is_current)
    }
}
