//! Line-oriented front end: reads commands from stdin and prints the active
//! lyric line with fade markers.

use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::audio::AudioBackend;
use crate::catalog::Catalog;
use crate::exposure::{ExposureAnalytics, ExposureStore};
use crate::playback::{
    dispatch, CommandOutcome, LineView, PlaybackController, PlaybackEvent, PlayerCommand,
};

const HELP: &str = "commands: open <song> | p | play | pause | seek <ms> | tap <line> <segment> | stats | back | exit";

pub async fn run_console<A: AudioBackend, S: ExposureStore>(
    controller: PlaybackController<A, S>,
    catalog: Arc<Catalog>,
    initial_song: Option<String>,
) -> Result<()> {
    let renderer = tokio::spawn(render_events(controller.clone()));

    println!("{HELP}");
    if let Some(song_id) = initial_song {
        run_command(&controller, &catalog, PlayerCommand::SelectSong(song_id)).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" {
            break;
        }
        if input == "help" {
            println!("{HELP}");
            continue;
        }
        match input.parse::<PlayerCommand>() {
            Ok(command) => run_command(&controller, &catalog, command).await,
            Err(err) => println!("{err}\n{HELP}"),
        }
    }

    controller.dispose().await;
    controller.flush_exposures().await;
    renderer.abort();
    info!("Console session finished");
    Ok(())
}

async fn run_command<A: AudioBackend, S: ExposureStore>(
    controller: &PlaybackController<A, S>,
    catalog: &Catalog,
    command: PlayerCommand,
) {
    match dispatch(controller, catalog, command).await {
        Ok(CommandOutcome::Snapshot(snapshot)) => {
            if let Some(title) = &snapshot.title {
                println!("{title} [{:?}] @ {}ms", snapshot.state.status, snapshot.state.position_ms);
            }
        }
        Ok(CommandOutcome::Analytics(analytics)) => print_analytics(&analytics),
        Ok(CommandOutcome::Closed(_)) => {
            controller.flush_exposures().await;
            for song in catalog.songs() {
                println!("  {} - {} ({})", song.id, song.title, song.language);
            }
        }
        Err(err) => println!("! {err}"),
    }
}

async fn render_events<A: AudioBackend, S: ExposureStore>(controller: PlaybackController<A, S>) {
    let mut events = controller.subscribe();
    let mut last_line = None;
    loop {
        match events.recv().await {
            Ok(PlaybackEvent::PositionChanged { line_index, segment_index, .. }) => {
                if last_line == Some((line_index, segment_index)) {
                    continue;
                }
                last_line = Some((line_index, segment_index));
                let snapshot = controller.get_snapshot().await;
                if let Some(line) = snapshot.current_line() {
                    println!("{}", render_line(line));
                }
            }
            Ok(PlaybackEvent::StateChanged { state }) => println!("[{:?}]", state.status),
            Ok(_) => {}
            Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}

/// `>word<` marks the current segment, `~word~` a struck-through one; hidden
/// segments print as underscores.
pub fn render_line(line: &LineView) -> String {
    let words: Vec<String> = line
        .segments
        .iter()
        .map(|segment| {
            let text = if segment.fade.opacity == 0.0 {
                "_".repeat(segment.text.chars().count())
            } else if segment.fade.strike_through {
                format!("~{}~", segment.text)
            } else {
                segment.text.clone()
            };
            if segment.is_current {
                format!(">{text}<")
            } else {
                text
            }
        })
        .collect();
    format!("{}\n    {}", words.join(" "), line.translation)
}

fn print_analytics(analytics: &ExposureAnalytics) {
    println!(
        "{} segments tracked, {:.1} views on average",
        analytics.tracked_segments, analytics.average_views
    );
    for heard in &analytics.most_heard {
        println!("  {:>4}x {}", heard.views, heard.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fade::FadeStyle;
    use crate::models::SegmentKey;
    use crate::playback::SegmentView;

    fn view(text: &str, views: u32, is_current: bool) -> SegmentView {
        SegmentView {
            key: SegmentKey::new(0, 0),
            text: text.into(),
            views,
            fade: FadeStyle::for_views(views),
            is_current,
        }
    }

    #[test]
    fn renders_fade_markers() {
        let line = LineView {
            original: "a b c".into(),
            translation: "x y z".into(),
            is_current: true,
            segments: vec![view("мой", 2, true), view("сад", 12, false), view("моя", 25, false)],
        };
        assert_eq!(render_line(&line), ">мой< ~сад~ ___\n    x y z");
    }
}
