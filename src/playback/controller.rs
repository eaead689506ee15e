use std::sync::{Arc, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::{JoinHandle, JoinSet},
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioBackend, AudioHandle};
use crate::error::PlaybackError;
use crate::exposure::{ExposureAnalytics, ExposureStore, ExposureTracker};
use crate::fade::FadeStyle;
use crate::models::{SegmentKey, Song};

use super::{PlaybackSnapshot, PlaybackState, PlaybackStatus};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEvent {
    #[serde(rename_all = "camelCase")]
    StateChanged { state: PlaybackState },
    #[serde(rename_all = "camelCase")]
    PositionChanged {
        position_ms: u64,
        line_index: usize,
        segment_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    ExposureRecorded {
        song_id: String,
        key: SegmentKey,
        views: u32,
        fade: FadeStyle,
    },
    #[serde(rename_all = "camelCase")]
    SegmentTapped { key: SegmentKey, text: String },
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Owns the audio handle for the active song and drives the position poll.
pub struct PlaybackController<A, S> {
    state: Arc<Mutex<PlaybackState>>,
    audio: Arc<A>,
    tracker: Arc<ExposureTracker<S>>,
    viewer_id: Arc<str>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    pending: Arc<std::sync::Mutex<JoinSet<()>>>,
    events: broadcast::Sender<PlaybackEvent>,
    tick_interval: Duration,
}

impl<A, S> Clone for PlaybackController<A, S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            audio: self.audio.clone(),
            tracker: self.tracker.clone(),
            viewer_id: self.viewer_id.clone(),
            ticker: self.ticker.clone(),
            pending: self.pending.clone(),
            events: self.events.clone(),
            tick_interval: self.tick_interval,
        }
    }
}

impl<A: AudioBackend, S: ExposureStore> PlaybackController<A, S> {
    pub fn new(
        audio: Arc<A>,
        tracker: Arc<ExposureTracker<S>>,
        viewer_id: &str,
        tick_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(PlaybackState::new())),
            audio,
            tracker,
            viewer_id: Arc::from(viewer_id),
            ticker: Arc::new(Mutex::new(None)),
            pending: Arc::new(std::sync::Mutex::new(JoinSet::new())),
            events,
            tick_interval,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    pub async fn get_state(&self) -> PlaybackState {
        self.state.lock().await.clone()
    }

    pub async fn get_snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot::from_state(&*self.state.lock().await)
    }

    /// Tear down the current song and acquire audio for `song`.
    ///
    /// On failure the controller is left `Idle` with no handle.
    pub async fn select_song(&self, song: Arc<Song>) -> Result<PlaybackSnapshot, PlaybackError> {
        self.teardown().await;

        let generation = {
            let mut state = self.state.lock().await;
            state.begin_loading(song.clone());
            state.generation
        };
        self.emit_state_changed().await;

        let counts = self.tracker.load_counts(&song.id, &self.viewer_id).await;
        self.tracker
            .seed_counts(&song.id, &self.viewer_id, song.seed_views());
        {
            let mut state = self.state.lock().await;
            if state.generation == generation {
                state.apply_counts(counts);
            }
        }

        let handle = match self.audio.load(&song.audio_file).await {
            Ok(handle) => handle,
            Err(err) => {
                log_error!("failed to load audio for {}: {err}", song.id);
                {
                    let mut state = self.state.lock().await;
                    if state.generation == generation {
                        state.status = PlaybackStatus::Idle;
                        state.handle = None;
                    }
                }
                self.emit_state_changed().await;
                return Err(PlaybackError::ResourceAcquisition {
                    song_id: song.id.clone(),
                    source: err,
                });
            }
        };

        let accepted = {
            let mut state = self.state.lock().await;
            if state.generation == generation && state.status == PlaybackStatus::Loading {
                state.handle = Some(handle);
                state.status = PlaybackStatus::Paused;
                true
            } else {
                false
            }
        };

        if !accepted {
            log_info!("dropping audio for superseded selection of {}", song.id);
            self.release_handle(handle).await;
            return Err(PlaybackError::Superseded {
                song_id: song.id.clone(),
            });
        }

        log_info!("song {} ready as {handle}", song.id);
        self.emit_state_changed().await;
        Ok(self.get_snapshot().await)
    }

    /// Start playback. Only a ready (paused) song can start; any other state
    /// is a no-op.
    pub async fn play(&self) -> Result<PlaybackSnapshot, PlaybackError> {
        let handle = {
            let state = self.state.lock().await;
            match (state.status, state.handle) {
                (PlaybackStatus::Paused, Some(handle)) => handle,
                (status, _) => {
                    log_info!("play ignored while {status:?}");
                    return Ok(PlaybackSnapshot::from_state(&state));
                }
            }
        };

        if let Err(err) = self.audio.play(handle).await {
            log_error!("play failed for {handle}: {err}");
            return Err(PlaybackError::Command {
                command: "play",
                source: err,
            });
        }

        let started = {
            let mut state = self.state.lock().await;
            let current = state.handle == Some(handle) && state.status == PlaybackStatus::Paused;
            if current {
                state.status = PlaybackStatus::Playing;
            }
            current
        };

        if started {
            self.spawn_ticker().await;
            self.emit_state_changed().await;
        }
        Ok(self.get_snapshot().await)
    }

    pub async fn pause(&self) -> Result<PlaybackSnapshot, PlaybackError> {
        let handle = {
            let state = self.state.lock().await;
            match (state.status, state.handle) {
                (PlaybackStatus::Playing, Some(handle)) => handle,
                (status, _) => {
                    log_info!("pause ignored while {status:?}");
                    return Ok(PlaybackSnapshot::from_state(&state));
                }
            }
        };

        if let Err(err) = self.audio.pause(handle).await {
            log_error!("pause failed for {handle}: {err}");
            return Err(PlaybackError::Command {
                command: "pause",
                source: err,
            });
        }

        self.cancel_ticker().await;
        {
            let mut state = self.state.lock().await;
            if state.handle == Some(handle) && state.status == PlaybackStatus::Playing {
                state.status = PlaybackStatus::Paused;
            }
        }
        self.emit_state_changed().await;
        Ok(self.get_snapshot().await)
    }

    pub async fn toggle_play(&self) -> Result<PlaybackSnapshot, PlaybackError> {
        let status = self.state.lock().await.status;
        if status == PlaybackStatus::Playing {
            self.pause().await
        } else {
            self.play().await
        }
    }

    /// Jump to `position_ms` and start a new pass: segments heard before the
    /// jump can be credited again. The playing/paused status is kept.
    pub async fn seek_to(&self, position_ms: u64) -> Result<PlaybackSnapshot, PlaybackError> {
        let handle = {
            let state = self.state.lock().await;
            match (state.status, state.handle) {
                (PlaybackStatus::Paused | PlaybackStatus::Playing, Some(handle)) => handle,
                _ => return Err(PlaybackError::NoSongLoaded),
            }
        };

        if let Err(err) = self.audio.seek(handle, position_ms).await {
            log_error!("seek to {position_ms}ms failed for {handle}: {err}");
            return Err(PlaybackError::Command {
                command: "seek",
                source: err,
            });
        }

        {
            let mut state = self.state.lock().await;
            if state.handle == Some(handle) {
                state.seek(position_ms);
                self.emit_position(&state);
            }
        }
        Ok(self.get_snapshot().await)
    }

    /// Tap-to-seek: jump to the start of a segment.
    pub async fn seek_to_segment(&self, key: SegmentKey) -> Result<PlaybackSnapshot, PlaybackError> {
        let (start_ms, text) = {
            let state = self.state.lock().await;
            let song = state.song().ok_or(PlaybackError::NoSongLoaded)?;
            let segment = song
                .segment(key)
                .ok_or_else(|| PlaybackError::UnknownSegment {
                    song_id: song.id.clone(),
                    key,
                })?;
            (segment.start_ms, segment.text.clone())
        };

        let snapshot = self.seek_to(start_ms).await?;
        let _ = self.events.send(PlaybackEvent::SegmentTapped { key, text });
        Ok(snapshot)
    }

    /// Release the audio handle and stop polling. Terminal; always succeeds.
    pub async fn dispose(&self) -> PlaybackSnapshot {
        self.teardown().await;
        {
            let mut state = self.state.lock().await;
            state.dispose();
        }
        self.emit_state_changed().await;
        self.get_snapshot().await
    }

    pub async fn analytics(&self) -> Option<ExposureAnalytics> {
        let song = self.state.lock().await.song().cloned()?;
        Some(self.tracker.analytics(&song, &self.viewer_id).await)
    }

    /// One poll cycle: sample the audio position, move the indices and credit
    /// newly heard segments. Returns the sampled position, if any.
    pub async fn poll_once(&self) -> Option<u64> {
        let (handle, generation) = {
            let state = self.state.lock().await;
            match (state.status, state.handle) {
                (PlaybackStatus::Playing, Some(handle)) => (handle, state.generation),
                _ => return None,
            }
        };

        let position_ms = match self.audio.position(handle).await {
            Ok(Some(position_ms)) => position_ms,
            Ok(None) => return None,
            Err(err) => {
                log_warn!("position poll failed for {handle}: {err}");
                return None;
            }
        };

        let (song_id, credited) = {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                return None;
            }
            let credited = state.advance(position_ms);
            self.emit_position(&state);
            (state.song_id.clone().unwrap_or_default(), credited)
        };

        for key in credited {
            self.spawn_increment(song_id.clone(), key, generation);
        }
        Some(position_ms)
    }

    /// Wait for every in-flight exposure write to finish.
    pub async fn flush_exposures(&self) {
        let mut pending = {
            let mut guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        while let Some(result) = pending.join_next().await {
            if let Err(err) = result {
                log_error!("exposure task failed: {err}");
            }
        }
    }

    fn spawn_increment(&self, song_id: String, key: SegmentKey, generation: u64) {
        let tracker = self.tracker.clone();
        let viewer_id = self.viewer_id.clone();
        let state = self.state.clone();
        let events = self.events.clone();

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(result) = pending.try_join_next() {
            if let Err(err) = result {
                log_error!("exposure task failed: {err}");
            }
        }

        pending.spawn(async move {
            let views = tracker.persist_increment(&song_id, key, &viewer_id).await;
            {
                let mut state = state.lock().await;
                if state.generation == generation {
                    state.set_views(key, views);
                }
            }
            let _ = events.send(PlaybackEvent::ExposureRecorded {
                song_id,
                key,
                views,
                fade: FadeStyle::for_views(views),
            });
        });
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.take() {
            previous.cancel.cancel();
            previous.handle.abort();
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = self.clone();
        let handle = tokio::spawn(async move { controller.tick_loop(token).await });

        *ticker_guard = Some(Ticker { handle, cancel });
    }

    async fn tick_loop(self, cancel: CancellationToken) {
        let start = time::Instant::now() + self.tick_interval;
        let mut interval = time::interval_at(start, self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.state.lock().await.status != PlaybackStatus::Playing {
                        break;
                    }
                    self.poll_once().await;
                }
                _ = cancel.cancelled() => {
                    log_info!("tick loop cancelled");
                    break;
                }
            }
        }
    }

    async fn cancel_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.cancel.cancel();
            ticker.handle.abort();
        }
    }

    /// Stop polling and release whatever handle is held. Release failures are
    /// logged and otherwise ignored.
    async fn teardown(&self) {
        self.cancel_ticker().await;
        let handle = self.state.lock().await.handle.take();
        if let Some(handle) = handle {
            self.release_handle(handle).await;
        }
    }

    async fn release_handle(&self, handle: AudioHandle) {
        if let Err(err) = self.audio.release(handle).await {
            log_warn!("failed to release {handle}: {err}");
        }
    }

    async fn emit_state_changed(&self) {
        let state = self.state.lock().await.clone();
        let _ = self.events.send(PlaybackEvent::StateChanged { state });
    }

    fn emit_position(&self, state: &PlaybackState) {
        let _ = self.events.send(PlaybackEvent::PositionChanged {
            position_ms: state.position_ms,
            line_index: state.line_index,
            segment_index: state.segment_index,
        });
    }
}
