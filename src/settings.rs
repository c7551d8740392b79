use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

const SETTLE_DELAY_ENV: &str = "RECITAL_SETTLE_DELAY_MS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerSettings {
    /// Pause between consecutive verses during play-all.
    pub settle_delay_ms: u64,
    /// Length a double-click stamps onto a verse.
    pub default_span_secs: f64,
    pub autoscroll: bool,
    /// Relative paths are taken from the data directory.
    pub audio_dir: PathBuf,
    pub timings_dir: PathBuf,
    /// Collections whose verses have per-verse clips.
    pub collections_with_audio: Vec<String>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 300,
            default_span_secs: 5.0,
            autoscroll: true,
            audio_dir: PathBuf::from("audio"),
            timings_dir: PathBuf::from("timings"),
            collections_with_audio: Vec::new(),
        }
    }
}

impl PlayerSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn default_span(&self) -> Duration {
        Duration::try_from_secs_f64(self.default_span_secs).unwrap_or(crate::timing::DEFAULT_SPAN)
    }

    pub fn audio_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.audio_dir)
    }

    pub fn timings_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.timings_dir)
    }

    fn apply_env(&mut self) {
        let Ok(raw) = std::env::var(SETTLE_DELAY_ENV) else {
            return;
        };
        match raw.trim().parse() {
            Ok(ms) => self.settle_delay_ms = ms,
            Err(_) => log_warn!("ignoring {SETTLE_DELAY_ENV}={raw:?}: not a number of ms"),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<PlayerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("settings in {} unreadable, using defaults: {err}", path.display());
                PlayerSettings::default()
            })
        } else {
            PlayerSettings::default()
        };
        data.apply_env();

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> Result<PlayerSettings> {
        Ok(self.read()?.clone())
    }

    pub fn set_autoscroll(&self, enabled: bool) -> Result<()> {
        let mut guard = self.write()?;
        guard.autoscroll = enabled;
        self.persist(&guard)
    }

    fn persist(&self, data: &PlayerSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, PlayerSettings>> {
        self.data
            .read()
            .map_err(|_| anyhow!("settings lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, PlayerSettings>> {
        self.data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))
    }
}
