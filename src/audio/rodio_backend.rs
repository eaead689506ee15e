use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{info, warn};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tokio::sync::oneshot;

use super::{AudioBackend, AudioError, AudioHandle};

type Reply<T> = oneshot::Sender<Result<T, AudioError>>;

enum AudioCommand {
    Load { path: PathBuf, uri: String, reply: Reply<AudioHandle> },
    Play { handle: AudioHandle, reply: Reply<()> },
    Pause { handle: AudioHandle, reply: Reply<()> },
    Seek { handle: AudioHandle, position: Duration, reply: Reply<()> },
    Position { handle: AudioHandle, reply: Reply<Option<u64>> },
    Release { handle: AudioHandle, reply: Reply<()> },
}

/// `rodio` playback on a dedicated thread.
///
/// `OutputStream` is not `Send`, so the stream and every `Sink` live on the
/// engine thread and are driven through a command channel.
pub struct RodioBackend {
    assets_dir: PathBuf,
    tx: Arc<Mutex<Option<mpsc::Sender<AudioCommand>>>>,
}

impl RodioBackend {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn resolve(&self, uri: &str) -> PathBuf {
        let path = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.assets_dir.join(path)
        }
    }

    fn ensure_thread(&self) -> Result<mpsc::Sender<AudioCommand>, AudioError> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|e| AudioError::Engine(e.to_string()))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || engine_loop(rx))
            .map_err(|e| AudioError::Engine(e.to_string()))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> AudioCommand,
    ) -> Result<T, AudioError> {
        let tx = self.ensure_thread()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(build(reply_tx))
            .map_err(|e| AudioError::Engine(e.to_string()))?;
        reply_rx
            .await
            .map_err(|_| AudioError::Engine("audio thread terminated unexpectedly".into()))?
    }
}

impl AudioBackend for RodioBackend {
    async fn load(&self, uri: &str) -> Result<AudioHandle, AudioError> {
        let path = self.resolve(uri);
        let uri = uri.to_string();
        self.request(|reply| AudioCommand::Load { path, uri, reply }).await
    }

    async fn play(&self, handle: AudioHandle) -> Result<(), AudioError> {
        self.request(|reply| AudioCommand::Play { handle, reply }).await
    }

    async fn pause(&self, handle: AudioHandle) -> Result<(), AudioError> {
        self.request(|reply| AudioCommand::Pause { handle, reply }).await
    }

    async fn seek(&self, handle: AudioHandle, position_ms: u64) -> Result<(), AudioError> {
        let position = Duration::from_millis(position_ms);
        self.request(|reply| AudioCommand::Seek { handle, position, reply })
            .await
    }

    async fn position(&self, handle: AudioHandle) -> Result<Option<u64>, AudioError> {
        self.request(|reply| AudioCommand::Position { handle, reply })
            .await
    }

    async fn release(&self, handle: AudioHandle) -> Result<(), AudioError> {
        self.request(|reply| AudioCommand::Release { handle, reply })
            .await
    }
}

struct Engine {
    _stream: Option<OutputStream>,
    output: Option<OutputStreamHandle>,
    sinks: HashMap<AudioHandle, Sink>,
    next_handle: u64,
}

impl Engine {
    fn ensure_output(&mut self) -> Result<&OutputStreamHandle, String> {
        if self.output.is_none() {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
            self._stream = Some(stream);
            self.output = Some(handle);
        }
        self.output
            .as_ref()
            .ok_or_else(|| "audio output missing".to_string())
    }

    fn load(&mut self, path: &Path) -> Result<AudioHandle, String> {
        let file = File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| e.to_string())?;
        let sink = Sink::try_new(self.ensure_output()?)
            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
        sink.pause();
        sink.append(source);

        self.next_handle += 1;
        let handle = AudioHandle(self.next_handle);
        self.sinks.insert(handle, sink);
        Ok(handle)
    }

    fn sink(&self, handle: AudioHandle) -> Result<&Sink, AudioError> {
        self.sinks
            .get(&handle)
            .ok_or(AudioError::NotLoaded { handle })
    }
}

fn engine_loop(rx: mpsc::Receiver<AudioCommand>) {
    let mut engine = Engine {
        _stream: None,
        output: None,
        sinks: HashMap::new(),
        next_handle: 0,
    };

    while let Ok(cmd) = rx.recv() {
        match cmd {
            AudioCommand::Load { path, uri, reply } => {
                let result = engine
                    .load(&path)
                    .map_err(|reason| AudioError::Load { uri: uri.clone(), reason });
                if let Ok(handle) = &result {
                    info!("Loaded {uri} as {handle}");
                }
                let _ = reply.send(result);
            }
            AudioCommand::Play { handle, reply } => {
                let _ = reply.send(engine.sink(handle).map(Sink::play));
            }
            AudioCommand::Pause { handle, reply } => {
                let _ = reply.send(engine.sink(handle).map(Sink::pause));
            }
            AudioCommand::Seek { handle, position, reply } => {
                let result = engine.sink(handle).and_then(|sink| {
                    sink.try_seek(position).map_err(|e| AudioError::Command {
                        command: "seek",
                        reason: e.to_string(),
                    })
                });
                let _ = reply.send(result);
            }
            AudioCommand::Position { handle, reply } => {
                let position = engine
                    .sinks
                    .get(&handle)
                    .map(|sink| sink.get_pos().as_millis() as u64);
                let _ = reply.send(Ok(position));
            }
            AudioCommand::Release { handle, reply } => {
                match engine.sinks.remove(&handle) {
                    Some(sink) => sink.stop(),
                    None => warn!("release of unknown {handle}"),
                }
                if engine.sinks.is_empty() {
                    engine.output = None;
                    engine._stream = None;
                }
                let _ = reply.send(Ok(()));
            }
        }
    }
}
