//! Retention policy: ordered tiers of `(bucket, min_age)`.
//!
//! Tier `BUCKET:AGE` means "for snapshots at least AGE old keep at most one per
//! BUCKET". A zero bucket (`0d:AGE`) keeps nothing older than AGE.
//!
//! Порядок тиров несёт смысл: оценка идёт от младшего min_age к старшему, и
//! выжившие в младшем тире становятся входной популяцией старших. Поэтому
//! политика всегда хранится отсортированной по возрастанию min_age; если
//! пользователь передал тиры в другом порядке, они пересортировываются с warning.

use std::fmt;
use std::str::FromStr;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::interval::Interval;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tier {
    pub bucket: Interval,
    pub min_age: Interval,
}

impl Tier {
    pub fn new(bucket: Interval, min_age: Interval) -> Result<Self> {
        if bucket.is_negative() {
            return Err(Error::config(format!(
                "retention bucket must not be negative (got {})",
                bucket
            )));
        }
        if min_age.is_negative() {
            return Err(Error::config(format!(
                "retention age must not be negative (got {})",
                min_age
            )));
        }
        Ok(Self { bucket, min_age })
    }

    /// Parse `INTERVAL:AGE`.
    pub fn parse(s: &str) -> Result<Self> {
        let (bucket, age) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| {
                Error::config(format!("keep argument must be INTERVAL:AGE, got \"{}\"", s))
            })?;
        if age.contains(':') {
            return Err(Error::config(format!(
                "keep argument must be INTERVAL:AGE, got \"{}\"",
                s
            )));
        }
        Self::new(Interval::parse(bucket)?, Interval::parse(age)?)
    }

    pub fn keeps_none(&self) -> bool {
        self.bucket.is_zero()
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bucket, self.min_age)
    }
}

/// Tiers sorted by ascending `min_age`. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    tiers: Vec<Tier>,
}

impl RetentionPolicy {
    /// Build from tiers in the order given. Out-of-order tiers are sorted
    /// (stable) and a warning is logged.
    pub fn new(tiers: Vec<Tier>) -> Self {
        let mut sorted = tiers.clone();
        sorted.sort_by_key(|t| t.min_age);
        if sorted != tiers {
            warn!(
                "retention tiers are not in ascending age order ({}); evaluating as {}",
                join(&tiers),
                join(&sorted)
            );
        }
        Self { tiers: sorted }
    }

    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let tiers = specs
            .iter()
            .map(|s| Tier::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(tiers))
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Smallest age at which any thinning starts.
    pub fn youngest_age(&self) -> Option<Interval> {
        self.tiers.first().map(|t| t.min_age)
    }

    /// Log the effective policy; warn about tiers younger than the snapshot interval.
    pub fn describe(&self, snapshot_interval: Interval) {
        if self.tiers.is_empty() {
            info!("no retention policy: all snapshots are kept");
        }
        for t in &self.tiers {
            if t.keeps_none() {
                info!("keeping no snapshots older than {}", t.min_age);
            } else {
                info!(
                    "keeping only 1 snapshot every {} for snapshots older than {}",
                    t.bucket, t.min_age
                );
            }
            if t.min_age < snapshot_interval {
                warn!(
                    "retention policy {} uses lower age than snapshot interval ({})",
                    t, snapshot_interval
                );
            }
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", join(&self.tiers))
    }
}

fn join(tiers: &[Tier]) -> String {
    tiers
        .iter()
        .map(Tier::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
