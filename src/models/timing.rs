use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::SegmentId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TimingStatus {
    Complete,
    Partial,
    NotSet,
}

impl TimingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimingStatus::Complete => "complete",
            TimingStatus::Partial => "partial",
            TimingStatus::NotSet => "not-set",
        }
    }
}

/// Offsets of one verse inside the master recording. A zero offset means
/// "not captured yet"; `end >= start` is expected but never enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingRecord {
    pub segment_id: SegmentId,
    pub start: Duration,
    pub end: Duration,
}

impl TimingRecord {
    pub fn empty(segment_id: SegmentId) -> Self {
        Self {
            segment_id,
            start: Duration::ZERO,
            end: Duration::ZERO,
        }
    }

    pub fn status(&self) -> TimingStatus {
        match (self.start.is_zero(), self.end.is_zero()) {
            (false, false) => TimingStatus::Complete,
            (false, true) => TimingStatus::Partial,
            _ => TimingStatus::NotSet,
        }
    }

    /// Whether `position` falls inside the captured range (inclusive).
    pub fn contains(&self, position: Duration) -> bool {
        self.status() == TimingStatus::Complete && position >= self.start && position <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: f64, end: f64) -> TimingRecord {
        TimingRecord {
            segment_id: SegmentId(1),
            start: Duration::from_secs_f64(start),
            end: Duration::from_secs_f64(end),
        }
    }

    #[test]
    fn status_is_derived_from_offsets() {
        assert_eq!(record(2.0, 5.0).status(), TimingStatus::Complete);
        assert_eq!(record(2.0, 0.0).status(), TimingStatus::Partial);
        assert_eq!(record(0.0, 0.0).status(), TimingStatus::NotSet);
        // An end without a start still counts as unset.
        assert_eq!(record(0.0, 4.0).status(), TimingStatus::NotSet);
    }

    #[test]
    fn contains_requires_a_complete_range() {
        assert!(record(2.0, 5.0).contains(Duration::from_secs(5)));
        assert!(!record(2.0, 5.0).contains(Duration::from_secs(6)));
        assert!(!record(2.0, 0.0).contains(Duration::from_secs(3)));
    }
}
