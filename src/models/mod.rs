pub mod segment;
pub mod timing;

pub use segment::{Segment, SegmentColor, SegmentId};
pub use timing::{TimingRecord, TimingStatus};
