pub mod audio;
pub mod catalog;
pub mod config;
pub mod console;
pub mod db;
pub mod error;
pub mod exposure;
pub mod fade;
pub mod models;
pub mod playback;
pub mod settings;
pub mod timeline;
mod utils;

use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

use audio::RodioBackend;
use catalog::Catalog;
use config::Config;
use db::{Database, DATABASE_FILE};
use exposure::{ExposureStore, ExposureTracker, MemoryExposureStore};
use playback::PlaybackController;
use settings::{PlayerSettings, SettingsStore, SETTINGS_FILE};

pub use error::PlaybackError;

pub fn init_logging() {
    // Reads RUST_LOG, defaulting to info
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

pub async fn run(config: Config) -> Result<()> {
    init_logging();
    info!("SingLingo starting up...");

    let catalog = match &config.catalog {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::bundled()?,
    };

    if config.list {
        for song in catalog.songs() {
            println!(
                "{}\t{}\t{}\t{} lines",
                song.id,
                song.title,
                song.language,
                song.lines.len()
            );
        }
        return Ok(());
    }

    let data_dir = config.data_dir();
    let settings_store = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
    let mut player = settings_store.player();
    if let Some(viewer) = &config.viewer {
        player.viewer_id = viewer.clone();
    }
    if let Some(assets_dir) = &config.assets_dir {
        player.assets_dir = Some(assets_dir.clone());
    }

    let assets_dir = player
        .assets_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("assets"));
    let audio = Arc::new(RodioBackend::new(assets_dir));
    let catalog = Arc::new(catalog);

    if config.offline {
        warn!("Offline mode: exposure counts will not be saved");
        let store = Arc::new(MemoryExposureStore::new());
        start_session(audio, store, &player, catalog, config.song).await
    } else {
        let store = Arc::new(Database::new(data_dir.join(DATABASE_FILE))?);
        start_session(audio, store, &player, catalog, config.song).await
    }
}

async fn start_session<S: ExposureStore>(
    audio: Arc<RodioBackend>,
    store: Arc<S>,
    player: &PlayerSettings,
    catalog: Arc<Catalog>,
    initial_song: Option<String>,
) -> Result<()> {
    info!(
        "Recording exposure as '{}' with a {}ms tick",
        player.viewer_id, player.tick_interval_ms
    );
    let tracker = Arc::new(ExposureTracker::new(store));
    let controller = PlaybackController::new(
        audio,
        tracker,
        &player.viewer_id,
        player.tick_interval(),
    );
    console::run_console(controller, catalog, initial_song).await
}
