//! Timestamp helpers
//!
//! Wire timestamps are unsigned milliseconds since the Unix epoch.
//! Session deadlines use the runtime's monotonic clock instead; wall
//! time appears only on emitted events.

use chrono::Utc;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn utc_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
