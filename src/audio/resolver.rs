use std::{collections::HashSet, path::PathBuf};

use crate::models::SegmentId;

use super::Locator;

/// Answers "is there audio for this?" and "where is it?" for verse clips.
pub trait ClipResolver: Send + Sync {
    fn has_audio_for_collection(&self, collection_id: &str) -> bool;

    fn has_audio_for_segment(&self, collection_id: &str, segment_id: SegmentId) -> bool;

    fn resolve_locator(&self, segment_id: SegmentId) -> Locator;
}

/// Resolves clips as `<audio_dir>/verse-<id>.mp3`, for an allow-list of
/// collections.
#[derive(Debug, Clone)]
pub struct DirectoryClipResolver {
    audio_dir: PathBuf,
    collections: HashSet<String>,
}

impl DirectoryClipResolver {
    pub fn new<I, S>(audio_dir: impl Into<PathBuf>, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            audio_dir: audio_dir.into(),
            collections: collections.into_iter().map(Into::into).collect(),
        }
    }
}

impl ClipResolver for DirectoryClipResolver {
    fn has_audio_for_collection(&self, collection_id: &str) -> bool {
        self.collections.contains(collection_id)
    }

    fn has_audio_for_segment(&self, collection_id: &str, segment_id: SegmentId) -> bool {
        self.has_audio_for_collection(collection_id) && self.resolve_locator(segment_id).exists()
    }

    fn resolve_locator(&self, segment_id: SegmentId) -> Locator {
        Locator::new(self.audio_dir.join(format!("verse-{segment_id}.mp3")))
    }
}
