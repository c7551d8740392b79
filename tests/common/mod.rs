#![allow(dead_code)]

use async_trait::async_trait;
use recital_lib::{
    audio::{Locator, MediaError, Transport, TransportEvent, TransportRegistry},
    models::{Segment, SegmentId},
    playback::{PlaybackMode, PlaybackState, SequenceController},
    viewport::ViewportScroller,
};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{sync::broadcast, time};

pub const SETTLE: Duration = Duration::from_millis(300);
pub const CLIP: Duration = Duration::from_secs(1);

// ============================================================================
// Fake transport - clip "plays" for a fixed length on the tokio clock
// ============================================================================

/// Shared across every fake in a test: the order of play calls and how many
/// transports were ever audible at once.
#[derive(Default)]
pub struct Audit {
    plays: Mutex<Vec<SegmentId>>,
    audible: AtomicUsize,
    max_audible: AtomicUsize,
}

impl Audit {
    pub fn plays(&self) -> Vec<SegmentId> {
        self.plays.lock().unwrap().clone()
    }

    pub fn max_audible(&self) -> usize {
        self.max_audible.load(Ordering::SeqCst)
    }

    fn started(&self) {
        let now = self.audible.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_audible.fetch_max(now, Ordering::SeqCst);
    }

    fn silenced(&self) {
        self.audible.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FakeInner {
    id: SegmentId,
    clip: Duration,
    fails: bool,
    playing: AtomicBool,
    position_ms: AtomicU64,
    generation: AtomicU64,
    loaded: Mutex<Option<Locator>>,
    prepared: AtomicUsize,
    events: broadcast::Sender<TransportEvent>,
    audit: Arc<Audit>,
}

impl FakeInner {
    fn silence(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            self.audit.silenced();
        }
    }
}

#[derive(Clone)]
pub struct FakeTransport {
    inner: Arc<FakeInner>,
}

impl FakeTransport {
    pub fn new(id: u32, clip: Duration, audit: Arc<Audit>) -> Self {
        Self::build(id, clip, false, audit)
    }

    /// A transport whose `play` always rejects.
    pub fn failing(id: u32, audit: Arc<Audit>) -> Self {
        Self::build(id, CLIP, true, audit)
    }

    fn build(id: u32, clip: Duration, fails: bool, audit: Arc<Audit>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(FakeInner {
                id: SegmentId(id),
                clip,
                fails,
                playing: AtomicBool::new(false),
                position_ms: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                loaded: Mutex::new(None),
                prepared: AtomicUsize::new(0),
                events,
                audit,
            }),
        }
    }

    pub fn prepared(&self) -> usize {
        self.inner.prepared.load(Ordering::SeqCst)
    }

    pub fn loaded(&self) -> Option<Locator> {
        self.inner.loaded.lock().unwrap().clone()
    }

    /// Emit a position report as the real engine's poll would.
    pub fn report_position(&self, position: Duration) {
        self.inner.position_ms.store(position.as_millis() as u64, Ordering::SeqCst);
        let _ = self.inner.events.send(TransportEvent::PositionChanged(position));
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn load(&self, locator: &Locator) -> Result<(), MediaError> {
        *self.inner.loaded.lock().unwrap() = Some(locator.clone());
        Ok(())
    }

    fn prepare(&self) {
        self.inner.prepared.fetch_add(1, Ordering::SeqCst);
    }

    async fn play(&self) -> Result<(), MediaError> {
        self.inner.audit.plays.lock().unwrap().push(self.inner.id);
        if self.inner.fails {
            return Err(MediaError::Decode {
                locator: format!("verse-{}.mp3", self.inner.id),
                reason: "corrupt frame".into(),
            });
        }

        if !self.inner.playing.swap(true, Ordering::SeqCst) {
            self.inner.audit.started();
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            time::sleep(inner.clip).await;
            if inner.generation.load(Ordering::SeqCst) == generation
                && inner.playing.load(Ordering::SeqCst)
            {
                inner.silence();
                inner
                    .position_ms
                    .store(inner.clip.as_millis() as u64, Ordering::SeqCst);
                let _ = inner.events.send(TransportEvent::Ended);
            }
        });
        Ok(())
    }

    fn pause(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.silence();
    }

    fn seek(&self, position: Duration) {
        self.inner
            .position_ms
            .store(position.as_millis() as u64, Ordering::SeqCst);
    }

    fn position(&self) -> Duration {
        Duration::from_millis(self.inner.position_ms.load(Ordering::SeqCst))
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.inner.clip)
    }

    fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.events.subscribe()
    }
}

// ============================================================================
// Scroller that remembers where it was asked to go
// ============================================================================

#[derive(Default)]
pub struct RecordingScroller {
    scrolled: Mutex<Vec<SegmentId>>,
    blocks_for: Duration,
}

impl RecordingScroller {
    /// A scroller that holds its worker thread, like a slow synchronous view.
    pub fn blocking(blocks_for: Duration) -> Self {
        Self {
            blocks_for,
            ..Self::default()
        }
    }

    pub fn scrolled(&self) -> Vec<SegmentId> {
        self.scrolled.lock().unwrap().clone()
    }
}

impl ViewportScroller for RecordingScroller {
    fn scroll_to_segment(&self, id: SegmentId) {
        if !self.blocks_for.is_zero() {
            std::thread::sleep(self.blocks_for);
        }
        self.scrolled.lock().unwrap().push(id);
    }
}

// ============================================================================
// Controller fixture
// ============================================================================

#[derive(Clone, Copy)]
pub enum Clip {
    Plays(Duration),
    Fails,
    Missing,
}

pub struct Fixture {
    pub controller: SequenceController,
    pub audit: Arc<Audit>,
    pub scroller: Arc<RecordingScroller>,
    pub transports: Vec<(SegmentId, FakeTransport)>,
}

impl Fixture {
    /// Verses numbered from 1, one per entry.
    pub fn new(clips: &[Clip]) -> Self {
        Self::with_scroller(clips, Arc::new(RecordingScroller::default()))
    }

    pub fn with_scroller(clips: &[Clip], scroller: Arc<RecordingScroller>) -> Self {
        let audit = Arc::new(Audit::default());
        let mut registry = TransportRegistry::new();
        let mut segments = Vec::new();
        let mut transports = Vec::new();

        for (order, clip) in clips.iter().enumerate() {
            let id = order as u32 + 1;
            let transport = match *clip {
                Clip::Plays(length) => Some(FakeTransport::new(id, length, Arc::clone(&audit))),
                Clip::Fails => Some(FakeTransport::failing(id, Arc::clone(&audit))),
                Clip::Missing => None,
            };
            segments.push(Segment::new(id, order).with_audio(transport.is_some()));
            if let Some(transport) = transport {
                registry.insert(SegmentId(id), Arc::new(transport.clone()));
                transports.push((SegmentId(id), transport));
            }
        }

        let controller = SequenceController::new(
            segments,
            registry,
            Arc::clone(&scroller) as Arc<dyn ViewportScroller>,
            SETTLE,
        );
        Self {
            controller,
            audit,
            scroller,
            transports,
        }
    }

    pub fn uniform(count: usize) -> Self {
        Self::new(&vec![Clip::Plays(CLIP); count])
    }

    pub fn transport(&self, id: u32) -> &FakeTransport {
        self.transports
            .iter()
            .find(|(segment, _)| *segment == SegmentId(id))
            .map(|(_, transport)| transport)
            .unwrap()
    }

    pub fn playing(&self) -> Vec<SegmentId> {
        self.controller.transports().playing()
    }

    pub async fn state(&self) -> PlaybackState {
        self.controller.snapshot().await
    }

    pub async fn wait_for_mode(&self, mode: PlaybackMode) -> PlaybackState {
        let mut states = self.controller.subscribe();
        let state = states
            .wait_for(|state| state.mode == mode)
            .await
            .unwrap()
            .clone();
        state
    }

    pub async fn wait_for_active(&self, id: u32) -> PlaybackState {
        let mut states = self.controller.subscribe();
        let state = states
            .wait_for(|state| state.active_segment == Some(SegmentId(id)))
            .await
            .unwrap()
            .clone();
        state
    }
}

pub fn ids(raw: &[u32]) -> Vec<SegmentId> {
    raw.iter().copied().map(SegmentId).collect()
}

pub async fn tick(ms: u64) {
    time::sleep(Duration::from_millis(ms)).await;
}
