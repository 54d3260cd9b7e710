//! Event ID generation.
//!
//! IDs are `{sequence:016}-{random:8 hex}` where `sequence` is the receipt
//! time in unix milliseconds times 1000 plus an in-process counter. IDs
//! issued by one process sort lexicographically in issue order, which the
//! delta stream relies on when comparing against its cursor.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// IDs available per millisecond before the sequence borrows from the next one.
const IDS_PER_MILLI: u64 = 1000;

static LAST_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generates a new event ID for an event received at `now`.
pub fn new_event_id(now: DateTime<Utc>) -> String {
    let floor = now.timestamp_millis().max(0) as u64 * IDS_PER_MILLI;

    // fetch_update with a closure that always returns Some cannot fail
    let previous = LAST_SEQUENCE
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(floor.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    let sequence = floor.max(previous + 1);

    let random = Uuid::new_v4().simple().to_string();
    format!("{:016}-{}", sequence, &random[..8])
}
