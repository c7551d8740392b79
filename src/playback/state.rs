use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::SegmentId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackMode {
    #[default]
    Idle,
    PlayingAll,
    PausedAll,
    PlayingSingle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub mode: PlaybackMode,
    pub active_segment: Option<SegmentId>,
    /// Index of the verse a play-all run resumes from.
    pub cursor_index: usize,
    /// Elapsed time of the active clip.
    pub position: Duration,
    /// Generation of the last command; work scheduled under an older epoch is stale.
    #[serde(skip)]
    pub epoch: u64,
    /// A single play cut into a play-all run that should stay resumable.
    #[serde(skip)]
    pub interrupted_run: bool,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Still inside the run started under `epoch`.
    pub fn run_continues(&self, epoch: u64) -> bool {
        self.is_current(epoch) && self.mode == PlaybackMode::PlayingAll
    }

    pub fn begin_run(&mut self) -> u64 {
        self.mode = PlaybackMode::PlayingAll;
        self.interrupted_run = false;
        self.position = Duration::ZERO;
        self.bump()
    }

    pub fn enter_segment(&mut self, id: SegmentId, index: usize) {
        self.active_segment = Some(id);
        self.cursor_index = index;
        self.position = Duration::ZERO;
    }

    /// Pause a run. The cursor stays put so resuming replays the paused verse.
    pub fn pause_run(&mut self) {
        self.mode = PlaybackMode::PausedAll;
        self.active_segment = None;
        self.position = Duration::ZERO;
        self.bump();
    }

    pub fn begin_single(&mut self, id: SegmentId, index: usize) -> u64 {
        self.interrupted_run = self.interrupted_run
            || matches!(self.mode, PlaybackMode::PlayingAll | PlaybackMode::PausedAll);
        self.mode = PlaybackMode::PlayingSingle;
        self.enter_segment(id, index);
        self.bump()
    }

    /// A single verse stopped, by the user or by running out. Returns to the
    /// paused run it interrupted, otherwise to idle.
    pub fn release_single(&mut self, index: usize) {
        let resumable = self.interrupted_run || self.mode == PlaybackMode::PlayingAll;
        self.mode = if resumable {
            PlaybackMode::PausedAll
        } else {
            PlaybackMode::Idle
        };
        self.interrupted_run = false;
        self.active_segment = None;
        self.cursor_index = index;
        self.position = Duration::ZERO;
        self.bump();
    }

    /// Natural end of a run, or an explicit stop.
    pub fn finish(&mut self) {
        self.mode = PlaybackMode::Idle;
        self.active_segment = None;
        self.cursor_index = 0;
        self.interrupted_run = false;
        self.position = Duration::ZERO;
        self.bump();
    }
}
