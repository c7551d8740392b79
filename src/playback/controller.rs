use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
    time,
};

use crate::{
    audio::{TransportEvent, TransportRegistry},
    models::{Segment, SegmentId},
    viewport::ViewportScroller,
};

use super::{PlaybackMode, PlaybackState};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Drives which verse is sounding. Owns the playback state; transports are
/// only commanded by verse id and observed through their events.
///
/// At most one transport is audible: every transition first cancels the
/// running driver task and stops the transport of the active verse.
#[derive(Clone)]
pub struct SequenceController {
    state: Arc<Mutex<PlaybackState>>,
    segments: Arc<Vec<Segment>>,
    transports: Arc<TransportRegistry>,
    scroller: Arc<dyn ViewportScroller>,
    /// The task playing a run or a single verse.
    driver: Arc<Mutex<Option<JoinHandle<()>>>>,
    /// Serialises user commands.
    commands: Arc<Mutex<()>>,
    state_tx: Arc<watch::Sender<PlaybackState>>,
    settle_delay: Duration,
}

impl SequenceController {
    pub fn new(
        segments: Vec<Segment>,
        transports: TransportRegistry,
        scroller: Arc<dyn ViewportScroller>,
        settle_delay: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::new());
        Self {
            state: Arc::new(Mutex::new(PlaybackState::new())),
            segments: Arc::new(segments),
            transports: Arc::new(transports),
            scroller,
            driver: Arc::new(Mutex::new(None)),
            commands: Arc::new(Mutex::new(())),
            state_tx: Arc::new(state_tx),
            settle_delay,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn transports(&self) -> &TransportRegistry {
        &self.transports
    }

    pub async fn snapshot(&self) -> PlaybackState {
        self.state.lock().await.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Play one verse, or stop it if it is the one already sounding.
    pub async fn play_single(&self, id: SegmentId) -> Result<PlaybackState> {
        let _command = self.commands.lock().await;
        let index = self
            .segments
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| anyhow!("unknown verse {id}"))?;

        let Some(transport) = self.transports.get(id) else {
            log_warn!("verse {} has no audio; ignoring play request", id);
            return Ok(self.snapshot().await);
        };

        self.cancel_driver().await;

        let epoch = {
            let mut state = self.state.lock().await;
            if state.active_segment == Some(id) && transport.is_playing() {
                transport.stop();
                state.release_single(index);
                self.publish(&state);
                log_info!("verse {} stopped by user, now {:?}", id, state.mode);
                return Ok(state.clone());
            }

            self.stop_active(&state);
            let epoch = state.begin_single(id, index);
            self.publish(&state);
            epoch
        };

        let events = transport.subscribe();
        match transport.play().await {
            Ok(()) => {
                log_info!("playing verse {}", id);
                let handle = tokio::spawn(self.clone().follow_single(epoch, index, events));
                *self.driver.lock().await = Some(handle);
            }
            Err(err) => {
                log_error!("verse {} failed to play: {}", id, err);
                let mut state = self.state.lock().await;
                if state.is_current(epoch) {
                    state.release_single(index);
                    self.publish(&state);
                }
            }
        }

        Ok(self.snapshot().await)
    }

    /// Start, pause or resume playing every verse in order.
    pub async fn toggle_all(&self) -> PlaybackState {
        let _command = self.commands.lock().await;
        self.cancel_driver().await;

        let mut state = self.state.lock().await;
        self.stop_active(&state);

        match state.mode {
            PlaybackMode::PlayingAll => {
                state.pause_run();
                self.publish(&state);
                log_info!("play-all paused at index {}", state.cursor_index);
                state.clone()
            }
            PlaybackMode::Idle | PlaybackMode::PlayingSingle | PlaybackMode::PausedAll => {
                if state.cursor_index >= self.segments.len() {
                    state.cursor_index = 0;
                }
                let start = state.cursor_index;
                let epoch = state.begin_run();
                self.publish(&state);
                let snapshot = state.clone();
                drop(state);

                log_info!("play-all from index {}", start);
                let handle = tokio::spawn(self.clone().run_sequence(epoch, start));
                *self.driver.lock().await = Some(handle);
                snapshot
            }
        }
    }

    /// Silence everything and return to idle with the cursor rewound.
    pub async fn stop(&self) -> PlaybackState {
        let _command = self.commands.lock().await;
        self.cancel_driver().await;

        let mut state = self.state.lock().await;
        self.stop_active(&state);
        state.finish();
        self.publish(&state);
        state.clone()
    }

    /// Viewer teardown: stop and rewind every transport.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.transports.stop_all();
        log_info!("sequence controller shut down");
    }

    async fn run_sequence(self, epoch: u64, start: usize) {
        let mut index = start;
        loop {
            let (id, transport) = {
                let mut state = self.state.lock().await;
                if !state.run_continues(epoch) {
                    return;
                }

                let Some(segment) = self.segments.get(index) else {
                    state.finish();
                    self.publish(&state);
                    log_info!("play-all finished");
                    return;
                };

                let Some(transport) = self.transports.get(segment.id) else {
                    log_info!("verse {} has no audio, skipping", segment.id);
                    index += 1;
                    continue;
                };

                state.enter_segment(segment.id, index);
                self.publish(&state);
                (segment.id, transport)
            };

            self.scroller.scroll_to_segment(id);
            if let Some(next) = self
                .segments
                .get(index + 1)
                .and_then(|s| self.transports.get(s.id))
            {
                next.prepare();
            }

            let mut events = transport.subscribe();
            let played = transport.play().await;
            if !self.state.lock().await.run_continues(epoch) {
                // Superseded while play() was in flight.
                transport.stop();
                return;
            }
            match played {
                Ok(()) => self.follow_clip(epoch, &mut events).await,
                Err(err) => log_error!("verse {} failed to play, moving on: {}", id, err),
            }

            // Let the view settle on the verse before the next one starts.
            time::sleep(self.settle_delay).await;
            index += 1;
        }
    }

    async fn follow_single(
        self,
        epoch: u64,
        index: usize,
        mut events: broadcast::Receiver<TransportEvent>,
    ) {
        self.follow_clip(epoch, &mut events).await;

        let mut state = self.state.lock().await;
        if state.is_current(epoch) {
            state.release_single(index);
            self.publish(&state);
        }
    }

    /// Wait for the clip to end or fail, mirroring its position meanwhile.
    async fn follow_clip(&self, epoch: u64, events: &mut broadcast::Receiver<TransportEvent>) {
        loop {
            match events.recv().await {
                Ok(TransportEvent::Ended) | Err(broadcast::error::RecvError::Closed) => return,
                Ok(TransportEvent::LoadError(err)) => {
                    log_warn!("clip failed mid-play: {}", err);
                    return;
                }
                Ok(TransportEvent::PositionChanged(position)) => {
                    let mut state = self.state.lock().await;
                    if state.is_current(epoch) {
                        state.position = position;
                        self.publish(&state);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    }

    /// Abort the driver and wait until it is gone. A driver being polled on
    /// another worker only stops at its next await, so it may still have
    /// started its clip; callers stop the active transport afterwards.
    async fn cancel_driver(&self) {
        let handle = self.driver.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }

    fn stop_active(&self, state: &PlaybackState) {
        if let Some(transport) = state.active_segment.and_then(|id| self.transports.get(id)) {
            transport.stop();
        }
    }

    fn publish(&self, state: &PlaybackState) {
        self.state_tx.send_replace(state.clone());
    }
}
