use std::{collections::HashMap, sync::Arc};

use crate::models::{Segment, SegmentId};

use super::{ClipResolver, MediaError, Transport};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// The viewer's transports, one per verse that has a clip.
#[derive(Default, Clone)]
pub struct TransportRegistry {
    transports: HashMap<SegmentId, Arc<dyn Transport>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transport for every segment the resolver has audio for.
    /// Segments without audio, or whose clip fails to load, get no entry and
    /// are skipped during playback.
    pub fn build<F>(
        collection_id: &str,
        segments: &[Segment],
        resolver: &dyn ClipResolver,
        mut make_transport: F,
    ) -> Result<Self, MediaError>
    where
        F: FnMut() -> Result<Arc<dyn Transport>, MediaError>,
    {
        let mut registry = Self::new();
        if !resolver.has_audio_for_collection(collection_id) {
            return Ok(registry);
        }

        for segment in segments.iter().filter(|s| s.has_audio) {
            let locator = resolver.resolve_locator(segment.id);
            let transport = make_transport()?;
            match transport.load(&locator) {
                Ok(()) => registry.insert(segment.id, transport),
                Err(err) => log_warn!("verse {} has no playable clip: {}", segment.id, err),
            }
        }

        Ok(registry)
    }

    pub fn insert(&mut self, id: SegmentId, transport: Arc<dyn Transport>) {
        self.transports.insert(id, transport);
    }

    pub fn get(&self, id: SegmentId) -> Option<Arc<dyn Transport>> {
        self.transports.get(&id).cloned()
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.transports.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    /// Segments whose transport currently reports playing.
    pub fn playing(&self) -> Vec<SegmentId> {
        let mut ids: Vec<_> = self
            .transports
            .iter()
            .filter(|(_, t)| t.is_playing())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn stop_all(&self) {
        for transport in self.transports.values() {
            transport.stop();
        }
    }
}
