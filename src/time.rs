//! Monotonic-enough timestamp helpers shared by the peer table and channel
//! registry. `last_seen` only ever needs to compare two readings taken on
//! the same machine, so wall-clock microseconds since `UNIX_EPOCH` is
//! sufficient and avoids pulling in a calendar/timezone crate for it.

use std::time::{SystemTime, UNIX_EPOCH};

/// Microsecond-resolution timestamp, matching the spec's `last_seen` field.
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}
