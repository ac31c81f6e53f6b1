//! Due calculator: is it time to take a new snapshot?

use chrono::{DateTime, Utc};

use crate::interval::Interval;
use crate::inventory::Inventory;
use crate::snapshot::{Snapshot, SubjectId};

/// True when `subject` has no snapshot yet, or the latest one is at least
/// `interval` old. A non-positive interval is always due (config rejects it).
pub fn is_snapshot_due(
    inventory: &Inventory,
    subject: SubjectId,
    interval: Interval,
    now: DateTime<Utc>,
) -> bool {
    is_due_after(inventory.latest(subject), interval, now)
}

pub fn is_due_after(latest: Option<&Snapshot>, interval: Interval, now: DateTime<Utc>) -> bool {
    match latest {
        None => true,
        Some(_) if !interval.is_positive() => true,
        Some(s) => s.age(now) >= interval.as_duration(),
    }
}
