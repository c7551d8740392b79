use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Stable identity of a verse within its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u32);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SegmentId {
    fn from(value: u32) -> Self {
        SegmentId(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SegmentColor {
    #[default]
    Plain,
    Accent,
    Muted,
}

impl SegmentColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentColor::Plain => "plain",
            SegmentColor::Accent => "accent",
            SegmentColor::Muted => "muted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: SegmentId,
    /// Position in the collection; the array index, not necessarily `id`.
    pub order: usize,
    pub has_audio: bool,
    pub color: SegmentColor,
    /// Display text and any other verse fields, carried through untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl Segment {
    pub fn new(id: impl Into<SegmentId>, order: usize) -> Self {
        Self {
            id: id.into(),
            order,
            has_audio: false,
            color: SegmentColor::default(),
            fields: Map::new(),
        }
    }

    pub fn with_audio(mut self, has_audio: bool) -> Self {
        self.has_audio = has_audio;
        self
    }

    /// First non-empty string among `keys`, used by views to pick a label.
    pub fn text(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.fields.get(*key).and_then(Value::as_str))
            .find(|text| !text.trim().is_empty())
    }
}
