/*!
 * Structured report logging for audit sweeps
 *
 * Emits JSON Lines records at sweep-start, interim-report,
 * per-failure, and sweep-complete granularity for monitoring and
 * forensic analysis, and reads them back for the `stats` command.
 */

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, VigilError};

/// One report record, tagged by event kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    SweepStart {
        timestamp: String,
        devices: String,
    },
    InterimReport {
        timestamp: String,
        passes: u64,
        failures: u64,
    },
    UnitFailure {
        timestamp: String,
        device: String,
        partition: String,
        path: String,
    },
    SweepComplete {
        timestamp: String,
        passes: u64,
        failures: u64,
        skipped: u64,
        elapsed_secs: f64,
        aborted: bool,
    },
}

/// RFC 3339 timestamp for report records
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Append-only JSON Lines report log, shared across audit workers
pub struct ReportLog {
    writer: Mutex<BufWriter<File>>,
}

impl ReportLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                VigilError::ReportLog(format!("cannot open {}: {}", path.display(), e))
            })?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one record. A failing report log must never take the
    /// daemon down with it, so errors degrade to a warning.
    pub fn emit(&self, event: &ReportEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "could not serialize report event");
                return;
            }
        };

        let mut writer = self.writer.lock().unwrap();
        if let Err(err) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!(error = %err, "could not write report event");
        }
    }
}

/// Read every parseable record from a report log. Unparseable lines
/// (torn writes from a crashed daemon) are skipped with a warning.
pub fn read_report_log(path: &Path) -> Result<Vec<ReportEvent>> {
    let file = File::open(path)
        .map_err(|e| VigilError::ReportLog(format!("cannot open {}: {}", path.display(), e)))?;

    let mut events = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line
            .map_err(|e| VigilError::ReportLog(format!("cannot read {}: {}", path.display(), e)))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(event) => events.push(event),
            Err(err) => warn!(error = %err, "skipping unparseable report line"),
        }
    }
    Ok(events)
}

/// Aggregate summary computed from a report log
#[derive(Debug, Clone, Default)]
pub struct ReportStats {
    pub sweeps: usize,
    pub aborted_sweeps: usize,
    pub total_passes: u64,
    pub total_failures: u64,
    pub total_skipped: u64,
    pub total_elapsed_secs: f64,
    pub unit_failures: usize,
    pub most_recent: Option<ReportEvent>,
}

impl ReportStats {
    /// Calculate statistics from a report log.
    ///
    /// Totals are summed from sweep-complete records only: every unit
    /// audited lands in exactly one sweep, while interim reports are
    /// windowed flushes of the same counts.
    pub fn from_report_log(path: &Path) -> Result<Self> {
        let events = read_report_log(path)?;

        let mut stats = Self::default();
        for event in &events {
            match event {
                ReportEvent::SweepComplete {
                    passes,
                    failures,
                    skipped,
                    elapsed_secs,
                    aborted,
                    ..
                } => {
                    stats.sweeps += 1;
                    if *aborted {
                        stats.aborted_sweeps += 1;
                    }
                    stats.total_passes += passes;
                    stats.total_failures += failures;
                    stats.total_skipped += skipped;
                    stats.total_elapsed_secs += elapsed_secs;
                    stats.most_recent = Some(event.clone());
                }
                ReportEvent::UnitFailure { .. } => {
                    stats.unit_failures += 1;
                }
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Print formatted statistics
    pub fn print(&self) {
        println!("Vigil audit summary");
        println!("===================\n");

        println!("Completed sweeps: {}", self.sweeps);
        if self.aborted_sweeps > 0 {
            println!("  (aborted early: {})", self.aborted_sweeps);
        }
        println!("Units passed: {}", self.total_passes);
        println!("Units failed: {}", self.total_failures);
        println!("Tombstones skipped: {}", self.total_skipped);
        println!(
            "Total sweep time: {}",
            format_duration(self.total_elapsed_secs)
        );

        if self.sweeps > 0 {
            let avg = self.total_elapsed_secs / self.sweeps as f64;
            println!("Average sweep time: {}", format_duration(avg));
        }

        if let Some(ReportEvent::SweepComplete {
            timestamp,
            passes,
            failures,
            elapsed_secs,
            ..
        }) = &self.most_recent
        {
            println!("\nMost recent sweep:");
            println!("  {}", timestamp);
            println!(
                "  {} passed, {} failed in {}",
                passes,
                failures,
                format_duration(*elapsed_secs)
            );
        }
    }
}

/// Format a duration in seconds into human-readable form
fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        return format!("{:.0}ms", secs * 1000.0);
    }

    let total = secs as u64;
    let minutes = total / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes % 60, total % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, total % 60)
    } else {
        format!("{:.1}s", secs)
    }
}
