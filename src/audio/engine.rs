use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use super::{Locator, MediaError, Transport, TransportEvent};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const EVENT_CAPACITY: usize = 64;

type ClipSource = Decoder<BufReader<File>>;

enum EngineCommand {
    Register {
        id: Uuid,
        status: Arc<TransportStatus>,
        events: broadcast::Sender<TransportEvent>,
    },
    Load { id: Uuid, locator: Locator },
    Prepare { id: Uuid },
    Play {
        id: Uuid,
        reply: oneshot::Sender<Result<(), MediaError>>,
    },
    Pause { id: Uuid },
    Seek { id: Uuid, position: Duration },
    Stop { id: Uuid },
    Release { id: Uuid },
}

/// State the engine thread publishes for a transport; read lock-free by callers.
#[derive(Default)]
struct TransportStatus {
    playing: AtomicBool,
    position_ms: AtomicU64,
    /// Zero while unknown.
    duration_ms: AtomicU64,
}

impl TransportStatus {
    fn set_position(&self, position: Duration) {
        self.position_ms
            .store(position.as_millis() as u64, Ordering::SeqCst);
    }
}

struct Slot {
    status: Arc<TransportStatus>,
    events: broadcast::Sender<TransportEvent>,
    locator: Option<Locator>,
    prepared: Option<ClipSource>,
    sink: Option<Sink>,
    /// Seek requested before a sink existed; applied on the next play.
    start_at: Duration,
}

impl Slot {
    fn new(status: Arc<TransportStatus>, events: broadcast::Sender<TransportEvent>) -> Self {
        Self {
            status,
            events,
            locator: None,
            prepared: None,
            sink: None,
            start_at: Duration::ZERO,
        }
    }

    fn open(&mut self) -> Result<ClipSource, MediaError> {
        if let Some(source) = self.prepared.take() {
            return Ok(source);
        }
        let locator = self.locator.as_ref().ok_or(MediaError::NotLoaded)?;
        decode(locator)
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.start_at = Duration::ZERO;
        self.status.playing.store(false, Ordering::SeqCst);
        self.status.set_position(Duration::ZERO);
    }
}

fn decode(locator: &Locator) -> Result<ClipSource, MediaError> {
    let file = File::open(locator.path()).map_err(|err| MediaError::Load {
        locator: locator.to_string(),
        reason: err.to_string(),
    })?;
    Decoder::new(BufReader::new(file)).map_err(|err| MediaError::Decode {
        locator: locator.to_string(),
        reason: err.to_string(),
    })
}

/// Owner of the audio output. All rodio objects live on one dedicated thread
/// because the output stream is not `Send`; transports talk to it over a
/// command channel.
#[derive(Clone)]
pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<EngineCommand>>>>,
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<EngineCommand>, MediaError> {
        let mut guard = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<EngineCommand>();

        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let mut output: Option<(OutputStream, OutputStreamHandle)> = None;
                let mut slots: HashMap<Uuid, Slot> = HashMap::new();

                loop {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(cmd) => match cmd {
                            EngineCommand::Register { id, status, events } => {
                                slots.insert(id, Slot::new(status, events));
                            }
                            EngineCommand::Load { id, locator } => {
                                if let Some(slot) = slots.get_mut(&id) {
                                    slot.stop();
                                    slot.prepared = None;
                                    slot.status.duration_ms.store(0, Ordering::SeqCst);
                                    slot.locator = Some(locator);
                                }
                            }
                            EngineCommand::Prepare { id } => {
                                if let Some(slot) = slots.get_mut(&id) {
                                    prepare_slot(slot);
                                }
                            }
                            EngineCommand::Play { id, reply } => {
                                let result = match slots.get_mut(&id) {
                                    Some(slot) => play_slot(slot, &mut output),
                                    None => Err(MediaError::NotLoaded),
                                };
                                let _ = reply.send(result);
                            }
                            EngineCommand::Pause { id } => {
                                if let Some(slot) = slots.get_mut(&id) {
                                    if let Some(sink) = slot.sink.as_ref() {
                                        sink.pause();
                                    }
                                    slot.status.playing.store(false, Ordering::SeqCst);
                                }
                            }
                            EngineCommand::Seek { id, position } => {
                                if let Some(slot) = slots.get_mut(&id) {
                                    match slot.sink.as_ref() {
                                        Some(sink) if !sink.empty() => {
                                            if let Err(err) = sink.try_seek(position) {
                                                log_warn!("seek to {:?} failed: {}", position, err);
                                            }
                                        }
                                        _ => {
                                            slot.sink = None;
                                            slot.start_at = position;
                                        }
                                    }
                                    slot.status.set_position(position);
                                }
                            }
                            EngineCommand::Stop { id } => {
                                if let Some(slot) = slots.get_mut(&id) {
                                    slot.stop();
                                }
                            }
                            EngineCommand::Release { id } => {
                                if let Some(mut slot) = slots.remove(&id) {
                                    slot.stop();
                                }
                            }
                        },
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }

                    poll_slots(&mut slots);
                }

                log_debug!("audio engine thread exiting");
            })
            .map_err(|e| MediaError::Output(e.to_string()))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    /// Create a transport served by this engine.
    pub fn transport(&self) -> Result<RodioTransport, MediaError> {
        let tx = self.ensure_thread()?;
        let id = Uuid::new_v4();
        let status = Arc::new(TransportStatus::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        tx.send(EngineCommand::Register {
            id,
            status: Arc::clone(&status),
            events: events.clone(),
        })
        .map_err(|_| MediaError::EngineUnavailable)?;

        Ok(RodioTransport {
            id,
            tx,
            status,
            events,
        })
    }
}

fn ensure_output(
    output: &mut Option<(OutputStream, OutputStreamHandle)>,
) -> Result<OutputStreamHandle, MediaError> {
    if output.is_none() {
        let pair = OutputStream::try_default()
            .map_err(|e| MediaError::Output(format!("failed to open output stream: {e}")))?;
        *output = Some(pair);
    }
    output
        .as_ref()
        .map(|(_, handle)| handle.clone())
        .ok_or_else(|| MediaError::Output("output stream missing".into()))
}

fn prepare_slot(slot: &mut Slot) {
    if slot.prepared.is_some() || slot.sink.is_some() {
        return;
    }
    let Some(locator) = slot.locator.clone() else {
        return;
    };
    match decode(&locator) {
        Ok(source) => {
            if let Some(total) = source.total_duration() {
                slot.status
                    .duration_ms
                    .store(total.as_millis() as u64, Ordering::SeqCst);
            }
            slot.prepared = Some(source);
        }
        Err(err) => {
            log_warn!("prepare failed for {}: {}", locator, err);
            let _ = slot.events.send(TransportEvent::LoadError(err));
        }
    }
}

fn play_slot(
    slot: &mut Slot,
    output: &mut Option<(OutputStream, OutputStreamHandle)>,
) -> Result<(), MediaError> {
    let resumable = slot.sink.as_ref().is_some_and(|sink| !sink.empty());
    if !resumable {
        let handle = ensure_output(output)?;
        let source = slot.open()?;
        if let Some(total) = source.total_duration() {
            slot.status
                .duration_ms
                .store(total.as_millis() as u64, Ordering::SeqCst);
        }
        let sink = Sink::try_new(&handle)
            .map_err(|e| MediaError::Output(format!("failed to create sink: {e}")))?;
        sink.append(source);
        if !slot.start_at.is_zero() {
            if let Err(err) = sink.try_seek(slot.start_at) {
                log_warn!("initial seek to {:?} failed: {}", slot.start_at, err);
            }
        }
        slot.start_at = Duration::ZERO;
        slot.sink = Some(sink);
    }

    if let Some(sink) = slot.sink.as_ref() {
        sink.play();
    }
    slot.status.playing.store(true, Ordering::SeqCst);
    Ok(())
}

fn poll_slots(slots: &mut HashMap<Uuid, Slot>) {
    for slot in slots.values_mut() {
        if !slot.status.playing.load(Ordering::SeqCst) {
            continue;
        }
        let Some(sink) = slot.sink.as_ref() else {
            continue;
        };

        if sink.empty() {
            slot.sink = None;
            slot.status.playing.store(false, Ordering::SeqCst);
            let _ = slot.events.send(TransportEvent::Ended);
            continue;
        }

        let position = sink.get_pos();
        slot.status.set_position(position);
        let _ = slot.events.send(TransportEvent::PositionChanged(position));
    }
}

/// A transport whose audio is rendered by the shared engine thread.
pub struct RodioTransport {
    id: Uuid,
    tx: Sender<EngineCommand>,
    status: Arc<TransportStatus>,
    events: broadcast::Sender<TransportEvent>,
}

impl RodioTransport {
    fn send(&self, cmd: EngineCommand) {
        if self.tx.send(cmd).is_err() {
            log_error!("audio engine unavailable for transport {}", self.id);
        }
    }
}

#[async_trait]
impl Transport for RodioTransport {
    fn load(&self, locator: &Locator) -> Result<(), MediaError> {
        if !locator.exists() {
            return Err(MediaError::Load {
                locator: locator.to_string(),
                reason: "file not found".into(),
            });
        }
        self.tx
            .send(EngineCommand::Load {
                id: self.id,
                locator: locator.clone(),
            })
            .map_err(|_| MediaError::EngineUnavailable)
    }

    fn prepare(&self) {
        self.send(EngineCommand::Prepare { id: self.id });
    }

    async fn play(&self) -> Result<(), MediaError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::Play { id: self.id, reply })
            .map_err(|_| MediaError::EngineUnavailable)?;
        rx.await.map_err(|_| MediaError::EngineUnavailable)?
    }

    fn pause(&self) {
        self.send(EngineCommand::Pause { id: self.id });
    }

    fn seek(&self, position: Duration) {
        self.send(EngineCommand::Seek {
            id: self.id,
            position,
        });
    }

    fn stop(&self) {
        self.send(EngineCommand::Stop { id: self.id });
    }

    fn position(&self) -> Duration {
        Duration::from_millis(self.status.position_ms.load(Ordering::SeqCst))
    }

    fn duration(&self) -> Option<Duration> {
        match self.status.duration_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn is_playing(&self) -> bool {
        self.status.playing.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

impl Drop for RodioTransport {
    fn drop(&mut self) {
        let _ = self.tx.send(EngineCommand::Release { id: self.id });
    }
}
