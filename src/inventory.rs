//! In-memory snapshot inventory: subject id -> snapshots in chronological order.
//!
//! Инвентарь никогда не сохраняется: в боевом режиме строится заново на каждом
//! запуске из листинга API, в симуляции растёт в пределах одного прогона.

use std::collections::{BTreeMap, HashSet};

use crate::snapshot::{Snapshot, SnapshotId, SubjectId};

#[derive(Clone, Debug, Default)]
pub struct Inventory {
    by_subject: BTreeMap<SubjectId, Vec<Snapshot>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot list of `subject` (sorted chronologically).
    pub fn set(&mut self, subject: SubjectId, mut snapshots: Vec<Snapshot>) {
        sort_chronologically(&mut snapshots);
        self.by_subject.insert(subject, snapshots);
    }

    /// Insert keeping chronological order; equal timestamps keep insertion order.
    pub fn insert(&mut self, subject: SubjectId, snapshot: Snapshot) {
        let list = self.by_subject.entry(subject).or_default();
        let pos = list.partition_point(|s| s.created_at <= snapshot.created_at);
        list.insert(pos, snapshot);
    }

    pub fn snapshots(&self, subject: SubjectId) -> &[Snapshot] {
        self.by_subject
            .get(&subject)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn latest(&self, subject: SubjectId) -> Option<&Snapshot> {
        self.snapshots(subject).last()
    }

    /// Drop the given snapshot ids from `subject`; returns how many were removed.
    pub fn remove(&mut self, subject: SubjectId, ids: &HashSet<SnapshotId>) -> usize {
        match self.by_subject.get_mut(&subject) {
            Some(list) => {
                let before = list.len();
                list.retain(|s| !ids.contains(&s.id));
                before - list.len()
            }
            None => 0,
        }
    }

    pub fn subjects(&self) -> impl Iterator<Item = SubjectId> + '_ {
        self.by_subject.keys().copied()
    }

    pub fn len(&self, subject: SubjectId) -> usize {
        self.snapshots(subject).len()
    }

    pub fn total(&self) -> usize {
        self.by_subject.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Oldest first; ties broken by name so ordering never depends on input order.
pub fn sort_chronologically(snapshots: &mut [Snapshot]) {
    snapshots.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn snap(id: u64, hours: i64) -> Snapshot {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Snapshot::new(id, format!("s{id}"), t0 + Duration::hours(hours))
    }

    #[test]
    fn insert_keeps_chronological_order() {
        let mut inv = Inventory::new();
        inv.insert(7, snap(1, 10));
        inv.insert(7, snap(2, 0));
        inv.insert(7, snap(3, 5));
        let ids: Vec<u64> = inv.snapshots(7).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(inv.latest(7).map(|s| s.id), Some(1));
        assert!(inv.latest(8).is_none());
        assert_eq!(inv.snapshots(8).len(), 0);
    }

    #[test]
    fn set_sorts_and_remove_filters() {
        let mut inv = Inventory::new();
        inv.set(1, vec![snap(1, 3), snap(2, 1), snap(3, 2)]);
        inv.set(2, vec![snap(9, 0)]);
        assert_eq!(inv.total(), 4);
        assert_eq!(inv.subjects().collect::<Vec<_>>(), vec![1, 2]);

        let removed = inv.remove(1, &HashSet::from([2, 3, 42]));
        assert_eq!(removed, 2);
        assert_eq!(inv.len(1), 1);
        assert_eq!(inv.remove(5, &HashSet::from([1])), 0);
        assert!(!inv.is_empty());
    }
}
