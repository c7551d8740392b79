use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::models::{Segment, SegmentId, TimingRecord};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const RESERVED_KEYS: [&str; 3] = ["id", "start_time", "end_time"];

/// On-disk timing document: `{ "verses": [ {id, start_time, end_time, ...} ] }`
/// with offsets in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TimingFile {
    pub verses: Vec<TimingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingEntry {
    pub id: SegmentId,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
    /// Verse fields carried along for whoever reads the file next.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn timing_path(dir: &Path, collection_id: &str) -> PathBuf {
    dir.join(format!("timing-{collection_id}.json"))
}

impl TimingFile {
    /// Pair each verse with its exported record, in catalog order.
    pub fn from_records(segments: &[Segment], records: &[TimingRecord]) -> Self {
        let verses = segments
            .iter()
            .zip(records)
            .map(|(segment, record)| TimingEntry {
                id: segment.id,
                start_time: record.start.as_secs_f64(),
                end_time: record.end.as_secs_f64(),
                extra: segment
                    .fields
                    .iter()
                    .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            })
            .collect();
        Self { verses }
    }

    pub fn to_timings(&self) -> HashMap<SegmentId, TimingRecord> {
        self.verses
            .iter()
            .map(|entry| {
                let record = TimingRecord {
                    segment_id: entry.id,
                    start: seconds(entry.start_time),
                    end: seconds(entry.end_time),
                };
                (entry.id, record)
            })
            .collect()
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read timings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse timings in {}", path.display()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write timings to {}", path.display()))
    }
}

/// Existing timings for a collection. A missing or unreadable file means
/// starting fresh, never an error.
pub fn import_timings(path: &Path) -> HashMap<SegmentId, TimingRecord> {
    if !path.exists() {
        log_info!("no timing file at {}, starting fresh", path.display());
        return HashMap::new();
    }

    match TimingFile::read(path) {
        Ok(file) => file.to_timings(),
        Err(err) => {
            log_warn!("ignoring timing file: {err:#}");
            HashMap::new()
        }
    }
}

fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}
