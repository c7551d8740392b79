use anyhow::{bail, Context, Result};
use std::{
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::sync::broadcast;

use crate::{
    audio::{Locator, Transport, TransportEvent},
    catalog::Collection,
    models::SegmentId,
    viewport::ViewportScroller,
};

use super::{
    file::{import_timings, timing_path, TimingFile},
    TimingRecorder,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// The authoring tool: one master recording, the recorder, and the view
/// following whichever verse the playhead is in.
pub struct TimingEditor {
    collection: Collection,
    transport: Arc<dyn Transport>,
    recorder: TimingRecorder,
    scroller: Arc<dyn ViewportScroller>,
    autoscroll: bool,
    current_segment: Option<SegmentId>,
    timings_dir: PathBuf,
}

impl TimingEditor {
    pub fn open(
        collection: Collection,
        master: &Locator,
        transport: Arc<dyn Transport>,
        scroller: Arc<dyn ViewportScroller>,
        default_span: Duration,
        timings_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let mut editor = Self {
            collection,
            transport,
            recorder: TimingRecorder::new(default_span),
            scroller,
            autoscroll: true,
            current_segment: None,
            timings_dir: timings_dir.into(),
        };
        editor.bind(master)?;
        Ok(editor)
    }

    /// Switch collections. Captured timings that were not exported are lost.
    pub fn load_collection(
        &mut self,
        collection: Collection,
        master: &Locator,
        scroller: Arc<dyn ViewportScroller>,
    ) -> Result<()> {
        self.transport.stop();
        self.collection = collection;
        self.scroller = scroller;
        self.bind(master)
    }

    fn bind(&mut self, master: &Locator) -> Result<()> {
        self.transport
            .load(master)
            .with_context(|| format!("master recording for '{}'", self.collection.id))?;
        self.transport.prepare();

        self.recorder.reset();
        self.recorder.load(import_timings(&self.timings_path()));
        self.current_segment = None;
        log_info!(
            "editing '{}' against {} ({} verses)",
            self.collection.id,
            master,
            self.collection.segments.len()
        );
        Ok(())
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn recorder(&self) -> &TimingRecorder {
        &self.recorder
    }

    pub fn timings_path(&self) -> PathBuf {
        timing_path(&self.timings_dir, &self.collection.id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.transport.subscribe()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    /// Play or pause the master recording; returns whether it is now playing.
    pub async fn toggle_playback(&self) -> Result<bool> {
        if self.transport.is_playing() {
            self.transport.pause();
            return Ok(false);
        }
        self.transport.play().await?;
        Ok(true)
    }

    pub fn stop(&mut self) {
        self.transport.stop();
    }

    pub fn seek(&mut self, position: Duration) {
        self.transport.seek(position);
        self.follow_position(position);
    }

    pub fn position(&self) -> Duration {
        self.transport.position()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.transport.duration()
    }

    pub fn toggle_armed(&mut self) -> bool {
        self.recorder.toggle_armed()
    }

    pub fn click(&mut self, id: SegmentId) -> Result<()> {
        self.ensure_known(id)?;
        self.recorder.click(id, self.transport.position());
        Ok(())
    }

    pub fn double_click(&mut self, id: SegmentId) -> Result<()> {
        self.ensure_known(id)?;
        self.recorder.double_click(id, self.transport.position());
        Ok(())
    }

    pub fn clear(&mut self, id: SegmentId) -> Result<()> {
        self.ensure_known(id)?;
        self.recorder.clear(id);
        Ok(())
    }

    pub fn autoscroll(&self) -> bool {
        self.autoscroll
    }

    pub fn set_autoscroll(&mut self, enabled: bool) {
        self.autoscroll = enabled;
    }

    pub fn current_segment(&self) -> Option<SegmentId> {
        self.current_segment
    }

    /// First verse, in catalog order, whose captured range covers `position`.
    pub fn segment_at(&self, position: Duration) -> Option<SegmentId> {
        self.collection
            .segments
            .iter()
            .find(|segment| {
                self.recorder
                    .timing(segment.id)
                    .is_some_and(|timing| timing.contains(position))
            })
            .map(|segment| segment.id)
    }

    /// Track the verse under the playhead. Gaps keep the previous verse.
    pub fn follow_position(&mut self, position: Duration) {
        let Some(id) = self.segment_at(position) else {
            return;
        };
        if self.current_segment == Some(id) {
            return;
        }
        self.current_segment = Some(id);
        if self.autoscroll {
            self.scroller.scroll_to_segment(id);
        }
    }

    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PositionChanged(position) => self.follow_position(position),
            TransportEvent::Ended => log_info!("master recording ended"),
            TransportEvent::LoadError(err) => log_warn!("master recording failed: {}", err),
        }
    }

    /// Write every verse's timing to `timing-<collection>.json`.
    pub fn export(&self) -> Result<PathBuf> {
        if !self.recorder.has_timings() {
            bail!("no timings captured for '{}'", self.collection.id);
        }
        let records = self.recorder.export_timings(&self.collection.segments);
        let path = self.timings_path();
        TimingFile::from_records(&self.collection.segments, &records).write(&path)?;
        log_info!("exported {} timings to {}", records.len(), path.display());
        Ok(path)
    }

    fn ensure_known(&self, id: SegmentId) -> Result<()> {
        if self.collection.index_of(id).is_none() {
            bail!("verse {id} is not in '{}'", self.collection.id);
        }
        Ok(())
    }
}
