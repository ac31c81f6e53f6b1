//! Centralized run configuration.
//!
//! Goals:
//! - One immutable value describing a run, passed explicitly into the runner,
//!   the due calculator, the evaluator and the simulator (no global state).
//! - All validation happens here, before any API call: a bad interval, tier or
//!   simulate string is an InvalidConfiguration error.
//!
//! Env:
//! - DO_API_URL - override the API base URL (default https://api.digitalocean.com/v2/).
//!   The token (DO_TOKEN) is handled by `token`, not stored here.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::api::digitalocean::DEFAULT_API_URL;
use crate::error::{Error, Result};
use crate::interval::Interval;
use crate::policy::RetentionPolicy;
use crate::simulate::SimulationSpec;

pub const DEFAULT_TAG: &str = "autosnapshot";
/// `$droplet` and `$tag` are substituted per subject.
pub const DEFAULT_PREFIX: &str = "$droplet-$tag-";
pub const API_URL_ENV: &str = "DO_API_URL";

#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Only droplets carrying this tag are managed.
    pub tag: String,

    /// Snapshot name prefix template; only snapshots containing the expanded
    /// prefix are considered ours.
    pub prefix: String,

    /// Extra regions every retained snapshot must be present in.
    pub regions: Vec<String>,

    /// Take a snapshot when the latest one is at least this old. Always > 0.
    pub snapshot_interval: Interval,

    pub policy: RetentionPolicy,

    /// Suppress create/delete/transfer calls.
    pub dry_run: bool,

    /// `--simulate INTERVAL:DURATION`; implies dry-run.
    pub simulate: Option<SimulationSpec>,

    /// Pinned simulation start (default: wall clock).
    pub simulate_start: Option<DateTime<Utc>>,

    pub api_url: String,

    /// Machine-readable output.
    pub json: bool,
}

impl RunConfig {
    pub fn new(snapshot_interval: Interval) -> Result<Self> {
        let cfg = Self {
            tag: DEFAULT_TAG.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            regions: Vec::new(),
            snapshot_interval,
            policy: RetentionPolicy::default(),
            dry_run: false,
            simulate: None,
            simulate_start: None,
            api_url: DEFAULT_API_URL.to_string(),
            json: false,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply environment overrides (DO_API_URL).
    pub fn with_env(mut self) -> Self {
        if let Ok(v) = std::env::var(API_URL_ENV) {
            let v = v.trim();
            if !v.is_empty() {
                self.api_url = v.to_string();
            }
        }
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into().trim().to_string();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.regions = regions
            .into_iter()
            .map(|r| r.as_ref().trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        self
    }

    pub fn with_policy(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dry_run(mut self, on: bool) -> Self {
        self.dry_run = on;
        self
    }

    pub fn with_simulation(mut self, spec: Option<SimulationSpec>) -> Self {
        self.simulate = spec;
        self
    }

    pub fn with_simulation_start(mut self, start: Option<DateTime<Utc>>) -> Self {
        self.simulate_start = start;
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_json(mut self, on: bool) -> Self {
        self.json = on;
        self
    }

    /// Finish the builder: re-validate and return the configuration.
    pub fn build(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.snapshot_interval.is_positive() {
            return Err(Error::config(format!(
                "snapshot interval must be positive (got {})",
                self.snapshot_interval
            )));
        }
        if self.tag.is_empty() {
            return Err(Error::config("tag must not be empty"));
        }
        if self.prefix_for("x").is_empty() {
            return Err(Error::config("snapshot prefix must not be empty"));
        }
        Ok(())
    }

    pub fn is_simulation(&self) -> bool {
        self.simulate.is_some()
    }

    /// Simulation always runs dry.
    pub fn effective_dry_run(&self) -> bool {
        self.dry_run || self.is_simulation()
    }

    /// Expanded name prefix for a droplet.
    pub fn prefix_for(&self, droplet: &str) -> String {
        self.prefix
            .replace("$tag", &self.tag)
            .replace("$droplet", droplet)
            .trim()
            .to_string()
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RunConfig {{ \
             tag: {}, \
             prefix: {}, \
             regions: [{}], \
             snapshot_interval: {}, \
             policy: {}, \
             dry_run: {}, \
             simulate: {}, \
             api_url: {} \
             }}",
            self.tag,
            self.prefix,
            self.regions.join(", "),
            self.snapshot_interval,
            self.policy,
            self.effective_dry_run(),
            self.simulate
                .map(|s| format!("{}:{}", s.step, s.duration))
                .unwrap_or_else(|| "off".to_string()),
            self.api_url,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_snapshot_interval() {
        assert!(matches!(
            RunConfig::new(Interval::ZERO),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            RunConfig::new(Interval::days(-1)),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn prefix_template_expands() {
        let cfg = RunConfig::new(Interval::days(1))
            .unwrap()
            .with_tag(" nightly ")
            .with_prefix("$droplet-$tag-");
        assert_eq!(cfg.prefix_for("web-01"), "web-01-nightly-");

        let fixed = cfg.with_prefix("backup-");
        assert_eq!(fixed.prefix_for("web-01"), "backup-");
    }

    #[test]
    fn simulation_forces_dry_run() {
        let cfg = RunConfig::new(Interval::days(1))
            .unwrap()
            .with_simulation(Some(SimulationSpec::parse("4h:1w").unwrap()));
        assert!(!cfg.dry_run);
        assert!(cfg.effective_dry_run());
        assert!(cfg.to_string().contains("simulate: 4h:1w"));
    }

    #[test]
    fn regions_are_trimmed() {
        let cfg = RunConfig::new(Interval::days(1))
            .unwrap()
            .with_regions([" ams3", "", "sfo3 "]);
        assert_eq!(cfg.regions, vec!["ams3", "sfo3"]);
    }

    #[test]
    fn empty_tag_rejected_on_build() {
        let res = RunConfig::new(Interval::days(1)).unwrap().with_tag("  ").build();
        assert!(matches!(res, Err(Error::InvalidConfiguration(_))));
    }
}
