//! Human and JSON rendering of simulation results and run summaries.
//!
//! Все функции пишут в `impl Write`, CLI передаёт туда stdout; тесты - Vec<u8>.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::runner::RunSummary;
use crate::simulate::SimulationReport;
use crate::snapshot::{Snapshot, ISO_TIME_FORMAT};

const TIME_WIDTH: usize = 23;
const NAME_WIDTH: usize = 50;

/// One row of the remaining-snapshot table.
#[derive(Debug, Serialize)]
struct SnapshotRow<'a> {
    id: u64,
    name: &'a str,
    created_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    regions: &'a Vec<String>,
}

impl<'a> From<&'a Snapshot> for SnapshotRow<'a> {
    fn from(s: &'a Snapshot) -> Self {
        Self {
            id: s.id,
            name: &s.name,
            created_at: s.created_at_iso(),
            regions: &s.regions,
        }
    }
}

#[derive(Debug, Serialize)]
struct SimulationJson<'a> {
    start: String,
    end: String,
    steps: u64,
    created: usize,
    deleted: usize,
    remaining: Vec<SnapshotRow<'a>>,
}

/// Table of snapshots surviving a simulation, oldest first:
///
/// ```text
/// Time                    Name
/// ----------------------- --------------------------------------------------
/// 2024-01-02T00:00:00Z    simulated-autosnapshot-20240102T000000Z
/// ```
pub fn write_simulation_table<W: Write>(out: &mut W, report: &SimulationReport) -> Result<()> {
    writeln!(out, "{:<w$} {}", "Time", "Name", w = TIME_WIDTH)?;
    writeln!(out, "{} {}", "-".repeat(TIME_WIDTH), "-".repeat(NAME_WIDTH))?;
    if report.retained.is_empty() {
        writeln!(out, "(no snapshots)")?;
    }
    for s in &report.retained {
        let t = s.created_at.format(ISO_TIME_FORMAT).to_string();
        writeln!(out, "{:<w$} {}", t, s.name, w = TIME_WIDTH)?;
    }
    Ok(())
}

pub fn write_simulation_json<W: Write>(out: &mut W, report: &SimulationReport) -> Result<()> {
    let doc = SimulationJson {
        start: report.start.format(ISO_TIME_FORMAT).to_string(),
        end: report.end.format(ISO_TIME_FORMAT).to_string(),
        steps: report.steps,
        created: report.created,
        deleted: report.deleted,
        remaining: report.retained.iter().map(SnapshotRow::from).collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &doc)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, summary)?;
        writeln!(out)?;
        return Ok(());
    }
    let mode = if summary.dry_run { " (dry run)" } else { "" };
    writeln!(out, "droplets:    {}{}", summary.subjects, mode)?;
    writeln!(out, "snapshots:   {}", summary.snapshots_found)?;
    writeln!(out, "created:     {}", summary.created)?;
    writeln!(out, "deleted:     {}", summary.deleted)?;
    writeln!(out, "transferred: {}", summary.transferred)?;
    if !summary.failed.is_empty() {
        writeln!(out, "failed:      {}", summary.failed.join(", "))?;
    }
    Ok(())
}
