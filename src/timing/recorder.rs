use std::{collections::HashMap, time::Duration};

use crate::models::{Segment, SegmentId, TimingRecord, TimingStatus};

/// Length stamped by a double-click when no end is captured.
pub const DEFAULT_SPAN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingState {
    pub armed: bool,
    /// Verse whose start is captured and whose end is still awaited.
    pub pending_segment: Option<SegmentId>,
    pub timings: HashMap<SegmentId, TimingRecord>,
}

/// Turns clicks against the live transport position into per-verse ranges.
///
/// Clicks are contiguous by default: starting a new verse closes the pending
/// one at the same position. Nothing here touches disk; export is explicit.
#[derive(Debug, Clone)]
pub struct TimingRecorder {
    state: RecordingState,
    default_span: Duration,
}

impl Default for TimingRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_SPAN)
    }
}

impl TimingRecorder {
    pub fn new(default_span: Duration) -> Self {
        Self {
            state: RecordingState::default(),
            default_span,
        }
    }

    pub fn state(&self) -> &RecordingState {
        &self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state.armed
    }

    pub fn pending(&self) -> Option<SegmentId> {
        self.state.pending_segment
    }

    pub fn toggle_armed(&mut self) -> bool {
        self.state.armed = !self.state.armed;
        self.state.armed
    }

    /// First click starts a verse, a second click on it ends it.
    pub fn click(&mut self, id: SegmentId, position: Duration) {
        if !self.state.armed {
            return;
        }

        if self.state.pending_segment == Some(id) {
            self.record_mut(id).end = position;
            self.state.pending_segment = None;
            return;
        }

        if let Some(previous) = self.state.pending_segment {
            self.record_mut(previous).end = position;
        }
        self.record_mut(id).start = position;
        self.state.pending_segment = Some(id);
    }

    /// Stamp a verse with the default span in one action, closing any
    /// pending verse at the same position.
    pub fn double_click(&mut self, id: SegmentId, position: Duration) {
        if !self.state.armed {
            return;
        }

        if let Some(previous) = self.state.pending_segment.take() {
            if previous != id {
                self.record_mut(previous).end = position;
            }
        }
        self.state.timings.insert(
            id,
            TimingRecord {
                segment_id: id,
                start: position,
                end: position + self.default_span,
            },
        );
    }

    pub fn clear(&mut self, id: SegmentId) {
        self.state.timings.remove(&id);
        if self.state.pending_segment == Some(id) {
            self.state.pending_segment = None;
        }
    }

    pub fn timing(&self, id: SegmentId) -> Option<&TimingRecord> {
        self.state.timings.get(&id)
    }

    pub fn status(&self, id: SegmentId) -> TimingStatus {
        self.timing(id)
            .map(TimingRecord::status)
            .unwrap_or(TimingStatus::NotSet)
    }

    pub fn has_timings(&self) -> bool {
        !self.state.timings.is_empty()
    }

    /// One record per verse in catalog order. Untimed verses come out as
    /// zero-length placeholders so positions line up downstream.
    pub fn export_timings(&self, segments: &[Segment]) -> Vec<TimingRecord> {
        segments
            .iter()
            .map(|segment| {
                self.timing(segment.id)
                    .copied()
                    .unwrap_or_else(|| TimingRecord::empty(segment.id))
            })
            .collect()
    }

    /// Seed from an imported file, replacing whatever was captured.
    pub fn load(&mut self, timings: HashMap<SegmentId, TimingRecord>) {
        self.state.timings = timings;
        self.state.pending_segment = None;
    }

    /// Collection switch: forget everything, including the armed flag.
    pub fn reset(&mut self) {
        self.state = RecordingState::default();
    }

    fn record_mut(&mut self, id: SegmentId) -> &mut TimingRecord {
        self.state
            .timings
            .entry(id)
            .or_insert_with(|| TimingRecord::empty(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: SegmentId = SegmentId(1);
    const B: SegmentId = SegmentId(2);
    const C: SegmentId = SegmentId(3);

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value)
    }

    fn armed() -> TimingRecorder {
        let mut recorder = TimingRecorder::default();
        recorder.toggle_armed();
        recorder
    }

    fn range(recorder: &TimingRecorder, id: SegmentId) -> (f64, f64) {
        let record = recorder.timing(id).unwrap();
        (record.start.as_secs_f64(), record.end.as_secs_f64())
    }

    #[test]
    fn clicks_are_ignored_while_disarmed() {
        let mut recorder = TimingRecorder::default();
        recorder.click(A, secs(2.0));
        recorder.double_click(B, secs(3.0));
        assert!(!recorder.has_timings());
        assert_eq!(recorder.pending(), None);
    }

    #[test]
    fn second_click_on_same_verse_sets_end() {
        let mut recorder = armed();
        recorder.click(A, secs(2.0));
        assert_eq!(recorder.pending(), Some(A));
        assert_eq!(recorder.status(A), TimingStatus::Partial);

        recorder.click(A, secs(4.5));
        assert_eq!(range(&recorder, A), (2.0, 4.5));
        assert_eq!(recorder.pending(), None);
        assert_eq!(recorder.status(A), TimingStatus::Complete);
    }

    #[test]
    fn clicking_next_verse_closes_previous() {
        let mut recorder = armed();
        recorder.click(A, secs(2.0));
        recorder.click(B, secs(5.0));

        assert_eq!(range(&recorder, A), (2.0, 5.0));
        assert_eq!(range(&recorder, B), (5.0, 0.0));
        assert_eq!(recorder.pending(), Some(B));
    }

    #[test]
    fn double_click_stamps_default_span_and_clears_pending() {
        let mut recorder = armed();
        recorder.click(A, secs(4.0));
        recorder.double_click(C, secs(10.0));

        assert_eq!(range(&recorder, C), (10.0, 15.0));
        assert_eq!(recorder.pending(), None);
        assert_eq!(range(&recorder, A), (4.0, 10.0));
    }

    #[test]
    fn double_click_on_pending_verse_overwrites_it() {
        let mut recorder = armed();
        recorder.click(C, secs(8.0));
        recorder.double_click(C, secs(10.0));
        assert_eq!(range(&recorder, C), (10.0, 15.0));
        assert_eq!(recorder.pending(), None);
    }

    #[test]
    fn rearming_keeps_timings() {
        let mut recorder = armed();
        recorder.click(A, secs(1.0));
        recorder.click(B, secs(3.0));
        let before = recorder.state().timings.clone();

        assert!(!recorder.toggle_armed());
        assert!(recorder.toggle_armed());
        assert_eq!(recorder.state().timings, before);
    }

    #[test]
    fn clear_drops_timing_and_pending() {
        let mut recorder = armed();
        recorder.click(A, secs(1.0));
        recorder.clear(A);
        assert!(recorder.timing(A).is_none());
        assert_eq!(recorder.pending(), None);
        assert_eq!(recorder.status(A), TimingStatus::NotSet);
    }

    #[test]
    fn export_fills_untimed_verses_with_zeroes() {
        let segments: Vec<_> = (1..=3).map(|id| Segment::new(id, id as usize - 1)).collect();
        let mut recorder = armed();
        recorder.click(B, secs(3.0));
        recorder.click(B, secs(6.0));

        let exported = recorder.export_timings(&segments);
        assert_eq!(exported.len(), 3);
        assert_eq!(exported[0], TimingRecord::empty(A));
        assert_eq!(exported[1].start, secs(3.0));
        assert_eq!(exported[1].end, secs(6.0));
        assert_eq!(exported[2], TimingRecord::empty(C));
    }
}
