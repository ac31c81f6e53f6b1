//! Simulation driver: replays the tool every `step` for `duration` against a
//! virtual clock and an in-memory inventory.
//!
//! Нет ни одного внешнего вызова: симуляция всегда dry-run. Используется, чтобы
//! проверить политику хранения до применения её к реальным дроплетам.
//!
//! `Simulator::steps()` returns a fresh iterator every call, so a simulation can
//! be replayed from the start any number of times with identical results.

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::clock::{Clock, SimulatedClock};
use crate::due::is_snapshot_due;
use crate::error::{Error, Result};
use crate::evaluator::{evaluate, Deletion};
use crate::interval::Interval;
use crate::inventory::Inventory;
use crate::policy::RetentionPolicy;
use crate::snapshot::{snapshot_name, Snapshot, SnapshotId, Subject};

/// Name of the stand-in droplet used by the simulation.
pub const SIMULATED_SUBJECT: &str = "simulated";

/// `--simulate INTERVAL:DURATION`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulationSpec {
    pub step: Interval,
    pub duration: Interval,
}

impl SimulationSpec {
    pub fn new(step: Interval, duration: Interval) -> Result<Self> {
        if !step.is_positive() {
            return Err(Error::config(format!(
                "simulation step must be positive (got {})",
                step
            )));
        }
        if duration.is_negative() {
            return Err(Error::config(format!(
                "simulation duration must not be negative (got {})",
                duration
            )));
        }
        Ok(Self { step, duration })
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (step, duration) = s.trim().split_once(':').ok_or_else(|| {
            Error::config(format!(
                "simulate argument must be INTERVAL:DURATION, got \"{}\"",
                s
            ))
        })?;
        Self::new(Interval::parse(step)?, Interval::parse(duration)?)
    }

    /// `duration / step`, rounded to the nearest whole step.
    pub fn step_count(&self) -> u64 {
        let step = self.step.as_secs();
        let duration = self.duration.as_secs();
        ((duration + step / 2) / step) as u64
    }
}

/// What happened at one simulated instant.
#[derive(Clone, Debug)]
pub struct SimulationStep {
    pub index: u64,
    pub now: DateTime<Utc>,
    pub created: Option<Snapshot>,
    pub deleted: Vec<Deletion>,
    /// Inventory after deletions, chronological.
    pub retained: Vec<Snapshot>,
}

#[derive(Clone, Debug)]
pub struct SimulationReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub steps: u64,
    pub created: usize,
    pub deleted: usize,
    pub retained: Vec<Snapshot>,
}

#[derive(Clone, Debug)]
pub struct Simulator {
    policy: RetentionPolicy,
    snapshot_interval: Interval,
    spec: SimulationSpec,
    start: DateTime<Utc>,
    subject: Subject,
    prefix: String,
    regions: Vec<String>,
}

impl Simulator {
    pub fn new(
        policy: RetentionPolicy,
        snapshot_interval: Interval,
        spec: SimulationSpec,
        start: DateTime<Utc>,
    ) -> Self {
        Self {
            policy,
            snapshot_interval,
            spec,
            start,
            subject: Subject::new(0, SIMULATED_SUBJECT),
            prefix: format!("{}-", SIMULATED_SUBJECT),
            regions: Vec::new(),
        }
    }

    /// Prefix of synthesized snapshot names (already expanded).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Regions synthesized snapshots are considered present in.
    pub fn with_regions(mut self, regions: Vec<String>) -> Self {
        self.regions = regions;
        self
    }

    pub fn steps(&self) -> Steps<'_> {
        Steps {
            sim: self,
            clock: SimulatedClock::new(self.start),
            inventory: Inventory::new(),
            index: 0,
            total: self.spec.step_count(),
            next_id: 1,
            failed: false,
        }
    }

    pub fn run(&self) -> Result<SimulationReport> {
        let mut report = SimulationReport {
            start: self.start,
            end: self.start,
            steps: 0,
            created: 0,
            deleted: 0,
            retained: Vec::new(),
        };
        for step in self.steps() {
            let step = step?;
            report.steps = step.index;
            report.end = step.now;
            report.created += usize::from(step.created.is_some());
            report.deleted += step.deleted.len();
            report.retained = step.retained;
        }
        info!(
            "{} remaining snapshots after {} ({} steps, {} created, {} deleted)",
            report.retained.len(),
            self.spec.duration,
            report.steps,
            report.created,
            report.deleted
        );
        Ok(report)
    }
}

/// Lazy, finite sequence of simulation steps. Stops after the first error.
pub struct Steps<'a> {
    sim: &'a Simulator,
    clock: SimulatedClock,
    inventory: Inventory,
    index: u64,
    total: u64,
    next_id: SnapshotId,
    failed: bool,
}

impl Steps<'_> {
    fn step(&mut self) -> Result<SimulationStep> {
        self.index += 1;
        self.clock.advance(self.sim.spec.step);
        let now = self.clock.now();
        let subject = self.sim.subject.id;
        debug!("--- simulation {} at {}", self.index, now);

        let created = if is_snapshot_due(&self.inventory, subject, self.sim.snapshot_interval, now)
        {
            let snap = Snapshot::new(self.next_id, snapshot_name(&self.sim.prefix, now), now)
                .with_regions(self.sim.regions.clone());
            self.next_id += 1;
            info!("snapshotting droplet {} -> {}", self.sim.subject.name, snap.name);
            self.inventory.insert(subject, snap.clone());
            Some(snap)
        } else {
            None
        };

        let decision = evaluate(self.inventory.snapshots(subject), &self.sim.policy, now)?;
        for d in &decision.delete {
            info!(
                "deleting snapshot {} by policy (keep snapshot every {} if older than {})",
                d.snapshot.name, d.tier.bucket, d.tier.min_age
            );
        }
        self.inventory.remove(subject, &decision.delete_ids());

        Ok(SimulationStep {
            index: self.index,
            now,
            created,
            deleted: decision.delete,
            retained: decision.keep,
        })
    }
}

impl Iterator for Steps<'_> {
    type Item = Result<SimulationStep>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.index >= self.total {
            return None;
        }
        let res = self.step();
        self.failed = res.is_err();
        Some(res)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.failed {
            0
        } else {
            (self.total - self.index) as usize
        };
        (0, Some(left))
    }
}
