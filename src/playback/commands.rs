use std::str::FromStr;

use log::warn;

use crate::audio::AudioBackend;
use crate::catalog::Catalog;
use crate::exposure::{ExposureAnalytics, ExposureStore};
use crate::models::SegmentKey;

use super::{PlaybackController, PlaybackSnapshot};

/// Commands the presentation layer sends to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    SelectSong(String),
    TogglePlay,
    Play,
    Pause,
    SeekTo(u64),
    SeekToSegment(SegmentKey),
    ShowAnalytics,
    Close,
}

impl FromStr for PlayerCommand {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let mut parts = input.split_whitespace();
        let verb = parts.next().ok_or_else(|| "empty command".to_string())?;
        let mut number = |name: &str| -> Result<u64, String> {
            parts
                .next()
                .ok_or_else(|| format!("missing {name}"))?
                .parse::<u64>()
                .map_err(|e| format!("invalid {name}: {e}"))
        };

        let command = match verb {
            "open" | "select" => {
                let id = input[verb.len()..].trim();
                if id.is_empty() {
                    return Err("missing song id".into());
                }
                PlayerCommand::SelectSong(id.to_string())
            }
            "p" | "toggle" => PlayerCommand::TogglePlay,
            "play" => PlayerCommand::Play,
            "pause" => PlayerCommand::Pause,
            "seek" => PlayerCommand::SeekTo(number("position")?),
            "tap" => {
                let mut index = |name: &str| -> Result<usize, String> {
                    let value = number(name)?;
                    usize::try_from(value).map_err(|_| format!("{name} {value} is out of range"))
                };
                let line = index("line")?;
                let segment = index("segment")?;
                PlayerCommand::SeekToSegment(SegmentKey::new(line, segment))
            }
            "stats" => PlayerCommand::ShowAnalytics,
            "back" | "close" | "q" => PlayerCommand::Close,
            other => return Err(format!("unknown command '{other}'")),
        };
        Ok(command)
    }
}

#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Snapshot(PlaybackSnapshot),
    Analytics(ExposureAnalytics),
    Closed(PlaybackSnapshot),
}

/// Run one command. Failures are logged and returned as a message; the
/// controller state is never left half-changed.
pub async fn dispatch<A: AudioBackend, S: ExposureStore>(
    controller: &PlaybackController<A, S>,
    catalog: &Catalog,
    command: PlayerCommand,
) -> Result<CommandOutcome, String> {
    let result = match command {
        PlayerCommand::SelectSong(song_id) => {
            let song = catalog
                .find(&song_id)
                .cloned()
                .ok_or_else(|| format!("unknown song '{song_id}'"))?;
            controller.select_song(song).await
        }
        PlayerCommand::TogglePlay => controller.toggle_play().await,
        PlayerCommand::Play => controller.play().await,
        PlayerCommand::Pause => controller.pause().await,
        PlayerCommand::SeekTo(position_ms) => controller.seek_to(position_ms).await,
        PlayerCommand::SeekToSegment(key) => controller.seek_to_segment(key).await,
        PlayerCommand::ShowAnalytics => {
            return controller
                .analytics()
                .await
                .map(CommandOutcome::Analytics)
                .ok_or_else(|| "no song is loaded".to_string());
        }
        PlayerCommand::Close => return Ok(CommandOutcome::Closed(controller.dispose().await)),
    };

    result.map(CommandOutcome::Snapshot).map_err(|err| {
        warn!("command failed: {err}");
        err.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console_commands() {
        assert_eq!(
            "open kalinka".parse::<PlayerCommand>(),
            Ok(PlayerCommand::SelectSong("kalinka".into()))
        );
        assert_eq!("p".parse::<PlayerCommand>(), Ok(PlayerCommand::TogglePlay));
        assert_eq!("seek 4000".parse::<PlayerCommand>(), Ok(PlayerCommand::SeekTo(4000)));
        assert_eq!(
            "tap 1 3".parse::<PlayerCommand>(),
            Ok(PlayerCommand::SeekToSegment(SegmentKey::new(1, 3)))
        );
        assert_eq!("back".parse::<PlayerCommand>(), Ok(PlayerCommand::Close));
        assert_eq!("stats".parse::<PlayerCommand>(), Ok(PlayerCommand::ShowAnalytics));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!("".parse::<PlayerCommand>().is_err());
        assert!("open".parse::<PlayerCommand>().is_err());
        assert!("tap 1".parse::<PlayerCommand>().is_err());
        assert!("seek soon".parse::<PlayerCommand>().is_err());
        assert!("dance".parse::<PlayerCommand>().is_err());
        assert!("tap -1 0".parse::<PlayerCommand>().is_err());
    }

    #[test]
    fn tap_indices_outside_usize_are_rejected() {
        let input = format!("tap {} 0", u128::from(u64::MAX) + 1);
        assert!(input.parse::<PlayerCommand>().is_err());
        if usize::BITS < 64 {
            let err = format!("tap {} 0", u64::MAX).parse::<PlayerCommand>().unwrap_err();
            assert!(err.contains("out of range"), "{err}");
        } else {
            assert_eq!(
                format!("tap {} 0", usize::MAX).parse::<PlayerCommand>(),
                Ok(PlayerCommand::SeekToSegment(SegmentKey::new(usize::MAX, 0)))
            );
        }
    }
}
