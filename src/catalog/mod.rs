//! Static song catalog.
//!
//! The bundled songs are compiled into the binary; a JSON file with the same
//! shape can replace them at startup.

use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::models::Song;

const BUNDLED_SONGS: &str = include_str!("songs.json");

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    songs: Vec<Arc<Song>>,
}

impl Catalog {
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_SONGS).context("failed to parse bundled song catalog")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog from {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("failed to parse catalog {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let songs: Vec<Song> = serde_json::from_str(json)?;
        for song in &songs {
            for warning in song.timing_warnings() {
                warn!("catalog song '{}': {}", song.id, warning);
            }
        }
        info!("Loaded catalog with {} songs", songs.len());

        Ok(Self {
            songs: songs.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn songs(&self) -> &[Arc<Song>] {
        &self.songs
    }

    pub fn find(&self, song_id: &str) -> Option<&Arc<Song>> {
        self.songs.iter().find(|song| song.id == song_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Granularity;

    #[test]
    fn bundled_catalog_has_both_granularities() {
        let catalog = Catalog::bundled().expect("bundled catalog parses");
        assert_eq!(catalog.songs().len(), 2);

        let hawaiian = catalog.find("ua-like-no-a-like").expect("song present");
        assert_eq!(hawaiian.granularity, Granularity::Word);
        assert_eq!(hawaiian.segment_count(), 8);

        let kalinka = catalog.find("kalinka").expect("song present");
        assert_eq!(kalinka.granularity, Granularity::Utterance);
        assert_eq!(kalinka.lines.len(), 2);
        assert_eq!(kalinka.duration_ms(), 12000);
        assert_eq!(kalinka.segment_count(), 8);
        assert!(kalinka.timing_warnings().is_empty());
    }

    #[test]
    fn unknown_song_is_absent() {
        let catalog = Catalog::bundled().expect("bundled catalog parses");
        assert!(catalog.find("missing").is_none());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(Catalog::from_json("[{\"id\": 1}]").is_err());
    }

    #[test]
    fn seed_views_default_to_zero() {
        let json = r#"[{
            "id": "s", "title": "S", "language": "x", "audioFile": "s.mp3",
            "lines": [{ "startMs": 0, "endMs": 10, "original": "a", "translation": "a",
                        "segments": [{ "text": "a", "startMs": 0, "endMs": 10 }] }]
        }]"#;
        let catalog = Catalog::from_json(json).expect("minimal song parses");
        let song = catalog.find("s").expect("song present");
        assert_eq!(song.lines[0].segments[0].views, 0);
        assert_eq!(song.granularity, Granularity::Utterance);
    }
}
