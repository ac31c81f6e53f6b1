//! Policy evaluator: splits a subject's snapshots into keep / delete.
//!
//! Алгоритм:
//! 1. Снимки сортируются по created_at (старые первыми, при равенстве - по имени).
//! 2. Тиры обходятся по возрастанию min_age. Для тира берутся ещё живые снимки
//!    с возрастом >= min_age и просматриваются от старых к новым: первый
//!    сохраняется, следующий сохраняется только если он не ближе чем bucket к
//!    последнему сохранённому этим тиром; остальные удаляются.
//! 3. Удалённый тиром снимок решён окончательно и в старшие тиры не попадает;
//!    сохранённые участвуют в популяции старших тиров.
//! 4. Снимки моложе всех min_age не трогаются.
//!
//! Bucket anchor is the oldest eligible snapshot and then each snapshot the tier
//! kept. A snapshot kept once stays kept on later runs while the policy is unchanged.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{Error, Result};
use crate::inventory::sort_chronologically;
use crate::policy::{RetentionPolicy, Tier};
use crate::snapshot::{Snapshot, SnapshotId};

/// A snapshot the policy wants gone, with the tier that removed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deletion {
    pub snapshot: Snapshot,
    pub tier: Tier,
}

/// Result of one evaluation. Both lists are in chronological order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Decision {
    pub keep: Vec<Snapshot>,
    pub delete: Vec<Deletion>,
}

impl Decision {
    pub fn delete_ids(&self) -> HashSet<SnapshotId> {
        self.delete.iter().map(|d| d.snapshot.id).collect()
    }

    pub fn is_kept(&self, name: &str) -> bool {
        self.keep.iter().any(|s| s.name == name)
    }

    pub fn is_deleted(&self, name: &str) -> bool {
        self.delete.iter().any(|d| d.snapshot.name == name)
    }

    /// keep ∪ delete == input and keep ∩ delete == ∅, compared as multisets of names.
    pub fn check_partition(&self, input: &[Snapshot]) -> Result<()> {
        let mut expected: Vec<&str> = input.iter().map(|s| s.name.as_str()).collect();
        let mut got: Vec<&str> = self
            .keep
            .iter()
            .map(|s| s.name.as_str())
            .chain(self.delete.iter().map(|d| d.snapshot.name.as_str()))
            .collect();
        expected.sort_unstable();
        got.sort_unstable();
        if expected != got {
            return Err(Error::Invariant(format!(
                "decision is not a partition of its input ({} in, {} kept, {} deleted)",
                input.len(),
                self.keep.len(),
                self.delete.len()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Verdict {
    Keep,
    Delete(Tier),
}

/// Apply `policy` to `snapshots` as of `now`.
pub fn evaluate(
    snapshots: &[Snapshot],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<Decision> {
    let mut sorted = snapshots.to_vec();
    sort_chronologically(&mut sorted);

    let mut verdicts = vec![Verdict::Keep; sorted.len()];

    for tier in policy.tiers() {
        let min_age = tier.min_age.as_duration();
        let bucket = tier.bucket.as_duration();
        let mut last_kept: Option<DateTime<Utc>> = None;

        for (i, snap) in sorted.iter().enumerate() {
            if verdicts[i] != Verdict::Keep || snap.age(now) < min_age {
                continue;
            }
            let too_close = match last_kept {
                Some(anchor) => snap.created_at - anchor < bucket,
                None => false,
            };
            if tier.keeps_none() || too_close {
                debug!(
                    "snapshot {} falls to tier {} (age {}h)",
                    snap.name,
                    tier,
                    snap.age(now).num_hours()
                );
                verdicts[i] = Verdict::Delete(*tier);
            } else {
                last_kept = Some(snap.created_at);
            }
        }
    }

    let mut decision = Decision::default();
    for (snap, verdict) in sorted.into_iter().zip(verdicts) {
        match verdict {
            Verdict::Keep => decision.keep.push(snap),
            Verdict::Delete(tier) => decision.delete.push(Deletion { snapshot: snap, tier }),
        }
    }
    decision.check_partition(snapshots)?;
    Ok(decision)
}
