pub mod rodio_backend;

use std::fmt;
use std::future::Future;

use serde::Serialize;
use thiserror::Error;

pub use rodio_backend::RodioBackend;

/// Opaque reference to one loaded audio resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AudioHandle(pub u64);

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audio#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to load audio '{uri}': {reason}")]
    Load { uri: String, reason: String },
    #[error("{handle} is not loaded")]
    NotLoaded { handle: AudioHandle },
    #[error("audio command '{command}' failed: {reason}")]
    Command { command: &'static str, reason: String },
    #[error("audio engine unavailable: {0}")]
    Engine(String),
}

/// Platform audio service. Every call may fail and may suspend.
pub trait AudioBackend: Send + Sync + 'static {
    fn load(&self, uri: &str) -> impl Future<Output = Result<AudioHandle, AudioError>> + Send;

    fn play(&self, handle: AudioHandle) -> impl Future<Output = Result<(), AudioError>> + Send;

    fn pause(&self, handle: AudioHandle) -> impl Future<Output = Result<(), AudioError>> + Send;

    fn seek(
        &self,
        handle: AudioHandle,
        position_ms: u64,
    ) -> impl Future<Output = Result<(), AudioError>> + Send;

    /// Current position, or `None` once the resource is unloaded.
    fn position(
        &self,
        handle: AudioHandle,
    ) -> impl Future<Output = Result<Option<u64>, AudioError>> + Send;

    fn release(&self, handle: AudioHandle) -> impl Future<Output = Result<(), AudioError>> + Send;
}
