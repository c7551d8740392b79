pub mod logging;

use std::time::Duration;

/// `m:ss` clock used by the timeline and timing displays.
pub fn format_clock(position: Duration) -> String {
    let total = position.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}
