use thiserror::Error;

use crate::audio::AudioError;
use crate::models::SegmentKey;

/// Failures surfaced by playback commands.
///
/// Every variant leaves the controller in a safe state: a failed load drops
/// back to idle and a failed command changes nothing.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("could not acquire audio for song '{song_id}'")]
    ResourceAcquisition {
        song_id: String,
        #[source]
        source: AudioError,
    },
    #[error("{command} rejected by the audio backend")]
    Command {
        command: &'static str,
        #[source]
        source: AudioError,
    },
    #[error("no song is loaded")]
    NoSongLoaded,
    #[error("song '{song_id}' has no segment {key}")]
    UnknownSegment { song_id: String, key: SegmentKey },
    #[error("selection of song '{song_id}' was superseded")]
    Superseded { song_id: String },
}
