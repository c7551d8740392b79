use std::{
    collections::HashMap,
    io::{self, Write},
};

use crate::models::{Segment, SegmentId};

/// Brings a verse into view. Best effort: ids without an anchor are ignored.
pub trait ViewportScroller: Send + Sync {
    fn scroll_to_segment(&self, id: SegmentId);
}

/// How much room the view has. Only the view layer looks at this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Compact,
    Wide,
}

impl DeviceClass {
    const COMPACT_MAX_COLUMNS: usize = 80;

    /// Narrow terminals get the compact layout.
    pub fn detect() -> Self {
        std::env::var("COLUMNS")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .map(Self::from_columns)
            .unwrap_or(DeviceClass::Wide)
    }

    pub fn from_columns(columns: usize) -> Self {
        if columns < Self::COMPACT_MAX_COLUMNS {
            DeviceClass::Compact
        } else {
            DeviceClass::Wide
        }
    }

    /// Which verse fields make up a line, in order of preference.
    pub fn label_fields(&self) -> &'static [&'static str] {
        match self {
            DeviceClass::Compact => &["sanskrit"],
            DeviceClass::Wide => &["sanskrit", "marathi", "text"],
        }
    }
}

/// Terminal scroller: "scrolling" to a verse prints its anchor line.
pub struct ConsoleScroller {
    anchors: HashMap<SegmentId, String>,
}

impl ConsoleScroller {
    pub fn new(segments: &[Segment], device: DeviceClass) -> Self {
        let anchors = segments
            .iter()
            .map(|segment| (segment.id, anchor_line(segment, device)))
            .collect();
        Self { anchors }
    }

}

impl ViewportScroller for ConsoleScroller {
    fn scroll_to_segment(&self, id: SegmentId) {
        if let Some(line) = self.anchors.get(&id) {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "▶ {line}");
        }
    }
}

pub fn anchor_line(segment: &Segment, device: DeviceClass) -> String {
    let text = match device {
        DeviceClass::Compact => segment
            .text(device.label_fields())
            .map(|t| t.lines().next().unwrap_or_default().to_string()),
        DeviceClass::Wide => {
            let parts: Vec<_> = device
                .label_fields()
                .iter()
                .filter_map(|key| segment.text(&[key]))
                .map(|t| t.replace('\n', " "))
                .collect();
            (!parts.is_empty()).then(|| parts.join(" | "))
        }
    };

    match text {
        Some(text) => format!("#{} {}", segment.id, text),
        None => format!("#{}", segment.id),
    }
}
