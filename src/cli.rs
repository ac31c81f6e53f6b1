use std::io::Write;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{debug, info};

use crate::api::{DigitalOcean, DryRun, SnapshotApi};
use crate::clock::{Clock, SystemClock};
use crate::config::{RunConfig, DEFAULT_PREFIX, DEFAULT_TAG};
use crate::interval::Interval;
use crate::policy::RetentionPolicy;
use crate::report::{write_simulation_json, write_simulation_table, write_summary};
use crate::runner::Runner;
use crate::simulate::{SimulationSpec, Simulator, SIMULATED_SUBJECT};
use crate::token::load_token;

#[derive(Parser, Debug)]
#[command(
    name = "do-snapshot",
    version,
    about = "Snapshot tagged DigitalOcean droplets and thin out old snapshots \
             by a retention policy",
    after_help = "Intervals are an integer with one suffix: \
                  h=hours, d=days, w=weeks, m=months (30 days).\n\
                  Example: do-snapshot -s 1d -k 1w:1m -k 1m:6m -k 0d:12m"
)]
pub struct Cli {
    /// Snapshot droplets with this tag
    #[arg(short = 't', long, default_value = DEFAULT_TAG)]
    pub tag: String,

    /// Prefix for snapshot names; $droplet and $tag are substituted
    #[arg(short = 'p', long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Transfer retained snapshots to this additional region (repeatable)
    #[arg(short = 'r', long = "region", value_name = "REGION")]
    pub regions: Vec<String>,

    /// Take a snapshot if the last one is at least AGE old
    #[arg(short = 's', long = "snapshot", value_name = "AGE")]
    pub snapshot: Interval,

    /// Keep one snapshot per INTERVAL among those older than AGE (repeatable)
    #[arg(short = 'k', long = "keep", value_name = "INTERVAL:AGE")]
    pub keep: Vec<String>,

    /// Don't take, delete or transfer any snapshots
    #[arg(long = "dryrun")]
    pub dry_run: bool,

    /// API token or path to a file containing it (default: DO_TOKEN env var)
    #[arg(long)]
    pub token: Option<String>,

    /// Replay the tool every INTERVAL for DURATION against a virtual clock (implies --dryrun)
    #[arg(long, value_name = "INTERVAL:DURATION")]
    pub simulate: Option<String>,

    /// Start time of the simulation, RFC 3339 (default: now)
    #[arg(long, value_name = "TIME", value_parser = parse_rfc3339, requires = "simulate")]
    pub simulate_start: Option<DateTime<Utc>>,

    /// Log to syslog instead of stderr
    #[arg(long)]
    pub syslog: bool,

    /// Increase verbosity
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_rfc3339(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 time \"{}\": {}", s, e))
}

impl Cli {
    /// Logging must know about dry-run before the config is built.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run || self.simulate.is_some()
    }

    pub fn to_config(&self) -> crate::Result<RunConfig> {
        let simulate = self
            .simulate
            .as_deref()
            .map(SimulationSpec::parse)
            .transpose()?;
        RunConfig::new(self.snapshot)?
            .with_env()
            .with_tag(self.tag.as_str())
            .with_prefix(self.prefix.as_str())
            .with_regions(&self.regions)
            .with_policy(RetentionPolicy::parse(self.keep.as_slice())?)
            .with_dry_run(self.dry_run)
            .with_simulation(simulate)
            .with_simulation_start(self.simulate_start)
            .with_json(self.json)
            .build()
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.to_config()?;
    debug!("{}", config);
    info!("will snapshot if latest is older than {}", config.snapshot_interval);
    config.policy.describe(config.snapshot_interval);

    if config.is_simulation() {
        return cmd_simulate(&config);
    }
    cmd_run(&config, cli.token.as_deref())
}

fn cmd_simulate(config: &RunConfig) -> Result<()> {
    let Some(spec) = config.simulate else {
        bail!("simulation was not requested");
    };
    let start = config
        .simulate_start
        .unwrap_or_else(|| SystemClock.now());
    info!(
        "simulating a run every {} for {} starting at {}",
        spec.step, spec.duration, start
    );
    let report = Simulator::new(config.policy.clone(), config.snapshot_interval, spec, start)
        .with_prefix(config.prefix_for(SIMULATED_SUBJECT))
        .with_regions(config.regions.clone())
        .run()?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if config.json {
        write_simulation_json(&mut out, &report)?;
    } else {
        write_simulation_table(&mut out, &report)?;
    }
    out.flush()?;
    Ok(())
}

fn cmd_run(config: &RunConfig, token: Option<&str>) -> Result<()> {
    let token = load_token(token)?;
    let client = DigitalOcean::new(&config.api_url, token)
        .with_context(|| format!("create API client for {}", config.api_url))?;

    let api: Box<dyn SnapshotApi> = if config.effective_dry_run() {
        info!("dry run: no snapshots will be taken, deleted or transferred");
        Box::new(DryRun::new(client))
    } else {
        Box::new(client)
    };
    let summary = Runner::new(&*api, config, SystemClock).run()?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_summary(&mut out, &summary, config.json)?;
    out.flush()?;

    if !summary.is_success() {
        bail!(
            "{} droplet(s) failed: {}",
            summary.failed.len(),
            summary.failed.join(", ")
        );
    }
    Ok(())
}
