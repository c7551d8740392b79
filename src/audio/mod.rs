pub mod engine;
pub mod registry;
pub mod resolver;

pub use engine::{AudioEngineHandle, RodioTransport};
pub use registry::TransportRegistry;
pub use resolver::{ClipResolver, DirectoryClipResolver};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tokio::sync::broadcast;

/// Where a clip lives. Today always a file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(PathBuf);

impl Locator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn exists(&self) -> bool {
        self.0.is_file()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("no clip loaded")]
    NotLoaded,
    #[error("failed to open {locator}: {reason}")]
    Load { locator: String, reason: String },
    #[error("failed to decode {locator}: {reason}")]
    Decode { locator: String, reason: String },
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("audio engine stopped")]
    EngineUnavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    PositionChanged(Duration),
    /// Fires once per play cycle when the clip runs out.
    Ended,
    LoadError(MediaError),
}

/// One playable audio resource. Transports know nothing about each other;
/// keeping a single one audible is the caller's job.
#[async_trait]
pub trait Transport: Send + Sync {
    fn load(&self, locator: &Locator) -> Result<(), MediaError>;

    /// Buffering hint for the loaded clip. Never required before `play`.
    fn prepare(&self);

    /// Resolves once audio is actually sounding, or with the reason it cannot.
    async fn play(&self) -> Result<(), MediaError>;

    fn pause(&self);

    fn seek(&self, position: Duration);

    /// Pause and rewind to the start.
    fn stop(&self) {
        self.pause();
        self.seek(Duration::ZERO);
    }

    fn position(&self) -> Duration;

    fn duration(&self) -> Option<Duration>;

    fn is_playing(&self) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}
