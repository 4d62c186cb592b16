use std::time::{SystemTime, UNIX_EPOCH};

pub const MILLIS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// Milliseconds since the unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
