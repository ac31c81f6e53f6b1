//! Production runner: list → decide → apply, one subject at a time.
//!
//! Решения принимает чистое ядро (`plan_subject`), runner только применяет их
//! через SnapshotApi. Порядок применения для субъекта: удаления по политике,
//! перенос выживших в недостающие регионы, затем новый снимок, если он положен.
//!
//! Ошибки: Auth/Invariant/InvalidConfiguration прерывают весь прогон; прочие
//! ошибки API логируются, субъект пропускается, прогон продолжается, а в
//! итоговой сводке субъект попадает в `failed`.
//!
//! The listing and the actions are not atomic: a snapshot that is still being
//! created is invisible to this run, the next run converges.

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::Serialize;

use crate::api::SnapshotApi;
use crate::clock::Clock;
use crate::config::RunConfig;
use crate::due::is_snapshot_due;
use crate::error::Result;
use crate::evaluator::{evaluate, Decision};
use crate::interval::format_age;
use crate::inventory::Inventory;
use crate::snapshot::{snapshot_name, Snapshot, Subject};

/// Everything decided for one subject, before any effect is applied.
#[derive(Clone, Debug)]
pub struct SubjectPlan {
    pub subject: Subject,
    pub prefix: String,
    /// Snapshots matching the prefix, chronological.
    pub managed: Vec<Snapshot>,
    /// Name of the snapshot to take now, if one is due.
    pub new_snapshot: Option<String>,
    pub decision: Decision,
    /// (snapshot, region) pairs for retained snapshots missing a region.
    pub transfers: Vec<(Snapshot, String)>,
}

/// Pure planning step: no I/O, deterministic for a given `now`.
pub fn plan_subject(
    config: &RunConfig,
    subject: &Subject,
    listed: Vec<Snapshot>,
    now: DateTime<Utc>,
) -> Result<SubjectPlan> {
    let prefix = config.prefix_for(&subject.name);
    let managed: Vec<Snapshot> = listed
        .into_iter()
        .filter(|s| s.name.contains(&prefix))
        .collect();
    for s in &managed {
        debug!("found snapshot {} ({}) for droplet {}", s.name, s.id, subject.name);
    }

    let mut inventory = Inventory::new();
    inventory.set(subject.id, managed);

    let due = is_snapshot_due(&inventory, subject.id, config.snapshot_interval, now);
    let decision = evaluate(inventory.snapshots(subject.id), &config.policy, now)?;

    let mut transfers = Vec::new();
    for s in &decision.keep {
        let missing = s.missing_regions(&config.regions);
        if missing.is_empty() && !config.regions.is_empty() {
            debug!(
                "snapshot {} is already in required regions ({})",
                s.name,
                s.regions.join(", ")
            );
        }
        for region in missing {
            transfers.push((s.clone(), region.to_string()));
        }
    }

    Ok(SubjectPlan {
        subject: subject.clone(),
        new_snapshot: due.then(|| snapshot_name(&prefix, now)),
        prefix,
        managed: inventory.snapshots(subject.id).to_vec(),
        decision,
        transfers,
    })
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub subjects: usize,
    pub snapshots_found: usize,
    pub created: usize,
    pub deleted: usize,
    pub transferred: usize,
    /// Names of subjects skipped because of an API error.
    pub failed: Vec<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Runner<'a, A, C> {
    api: A,
    config: &'a RunConfig,
    clock: C,
}

impl<'a, A: SnapshotApi, C: Clock> Runner<'a, A, C> {
    /// `api` should already be wrapped in `DryRun` when the config says so.
    pub fn new(api: A, config: &'a RunConfig, clock: C) -> Self {
        Self { api, config, clock }
    }

    pub fn run(&self) -> Result<RunSummary> {
        // один момент времени на весь прогон
        let now = self.clock.now();
        let subjects = self.api.list_subjects(&self.config.tag)?;
        info!(
            "{} droplets found with tag {}",
            subjects.len(),
            self.config.tag
        );

        let mut summary = RunSummary {
            dry_run: self.config.effective_dry_run(),
            subjects: subjects.len(),
            ..Default::default()
        };
        for subject in &subjects {
            match self.process_subject(subject, now, &mut summary) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("droplet {}: {}", subject, e);
                    summary.failed.push(subject.name.clone());
                }
            }
        }
        info!(
            "run finished: {} created, {} deleted, {} transferred, {} failed",
            summary.created,
            summary.deleted,
            summary.transferred,
            summary.failed.len()
        );
        Ok(summary)
    }

    fn process_subject(
        &self,
        subject: &Subject,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let listed = self.api.list_snapshots(subject)?;
        let plan = plan_subject(self.config, subject, listed, now)?;
        info!(
            "{} autosnapshots found for droplet {}",
            plan.managed.len(),
            subject.name
        );
        summary.snapshots_found += plan.managed.len();
        self.apply(&plan, now, summary)
    }

    fn apply(
        &self,
        plan: &SubjectPlan,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        for d in &plan.decision.delete {
            info!(
                "deleting snapshot {} by policy (keep snapshot every {} if older than {})",
                d.snapshot.name, d.tier.bucket, d.tier.min_age
            );
            self.api.delete_snapshot(&d.snapshot)?;
            summary.deleted += 1;
        }

        for (snapshot, region) in &plan.transfers {
            info!("transferring snapshot {} to region {}", snapshot.name, region);
            self.api.transfer_snapshot(snapshot, region)?;
            summary.transferred += 1;
        }

        match (&plan.new_snapshot, plan.managed.last()) {
            (Some(name), _) => {
                info!("snapshotting droplet {} -> {}", plan.subject.name, name);
                let action = self.api.create_snapshot(&plan.subject, name)?;
                debug!("snapshot response: {:?}", action);
                summary.created += 1;
            }
            (None, Some(latest)) => {
                info!(
                    "skipping snapshot, most recent is {} old",
                    format_age(latest.age(now))
                );
            }
            (None, None) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use crate::policy::RetentionPolicy;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
    }

    fn config() -> RunConfig {
        RunConfig::new(Interval::days(1))
            .unwrap()
            .with_policy(RetentionPolicy::parse(&["1w:1w"]).unwrap())
            .with_regions(["ams3"])
    }

    #[test]
    fn plan_filters_foreign_snapshots_by_prefix() {
        let web = Subject::new(1, "web");
        let listed = vec![
            Snapshot::new(1, "web-autosnapshot-20240430T060000Z", now() - Duration::days(1))
                .with_regions(["nyc3", "ams3"]),
            Snapshot::new(2, "manual-before-upgrade", now() - Duration::days(40)),
        ];
        let plan = plan_subject(&config(), &web, listed, now()).unwrap();
        assert_eq!(plan.prefix, "web-autosnapshot-");
        assert_eq!(plan.managed.len(), 1);
        assert!(plan.decision.delete.is_empty());
        assert!(plan.transfers.is_empty());
        assert_eq!(
            plan.new_snapshot.as_deref(),
            Some("web-autosnapshot-20240501T060000Z")
        );
    }

    #[test]
    fn plan_skips_when_latest_is_recent() {
        let web = Subject::new(1, "web");
        let listed = vec![Snapshot::new(
            1,
            "web-autosnapshot-a",
            now() - Duration::hours(3),
        )];
        let plan = plan_subject(&config(), &web, listed, now()).unwrap();
        assert!(plan.new_snapshot.is_none());
        assert_eq!(plan.transfers.len(), 1);
        assert_eq!(plan.transfers[0].1, "ams3");
    }

    #[test]
    fn deleted_snapshots_are_not_transferred() {
        let web = Subject::new(1, "web");
        let listed: Vec<Snapshot> = (7..14)
            .map(|d| {
                let at = now() - Duration::days(d);
                Snapshot::new(d as u64, format!("web-autosnapshot-{d}"), at)
            })
            .collect();
        let plan = plan_subject(&config(), &web, listed, now()).unwrap();
        assert_eq!(plan.decision.keep.len(), 1);
        assert_eq!(plan.decision.delete.len(), 6);
        assert_eq!(plan.transfers.len(), 1);
        assert_eq!(plan.transfers[0].0.id, 13);
    }
}
