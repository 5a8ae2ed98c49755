/*!
 * Pass orchestrator: drives one full sweep of the location
 * generator's output through the per-unit auditor
 *
 * Counters are time-windowed, not pass-windowed: the rolling report
 * window survives across sweeps in service mode and flushes (then
 * resets) whenever the reporting interval elapses mid-sweep, which
 * bounds log growth on arbitrarily long sweeps.
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::bounded;
use tracing::{debug, info};

use crate::config::AuditConfig;
use crate::error::Result;
use crate::report::{now_rfc3339, ReportEvent, ReportLog};

use super::auditor::{audit_unit, AuditOutcome};
use super::broker::BrokerOpener;
use super::locations::{DataUnitLocation, LocationIter, MountCheck};
use super::pace::UnitRateLimiter;
use super::shutdown::ShutdownHandle;

/// Statistics for one completed (or abandoned) sweep
#[derive(Debug, Clone)]
pub struct SweepStats {
    pub started: DateTime<Utc>,
    pub passes: u64,
    pub failures: u64,
    pub skipped: u64,
    pub elapsed: Duration,
    pub aborted: bool,
}

/// Rolling reporting window with shared pass/fail counters.
///
/// Safe to increment from any number of audit workers; a flush
/// atomically drains the counts so nothing is dropped or counted
/// twice across window boundaries.
pub struct ReportWindow {
    interval: Duration,
    passes: AtomicU64,
    failures: AtomicU64,
    deadline: Mutex<Instant>,
}

impl ReportWindow {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            passes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            deadline: Mutex::new(Instant::now() + interval),
        }
    }

    pub fn record(&self, outcome: AuditOutcome) {
        match outcome {
            AuditOutcome::Passed => {
                self.passes.fetch_add(1, Ordering::SeqCst);
            }
            AuditOutcome::Failed => {
                self.failures.fetch_add(1, Ordering::SeqCst);
            }
            AuditOutcome::Skipped => {}
        }
    }

    /// Current windowed counts (passes, failures)
    pub fn counts(&self) -> (u64, u64) {
        (
            self.passes.load(Ordering::SeqCst),
            self.failures.load(Ordering::SeqCst),
        )
    }

    /// Emit an interim report and reset the counters if the window
    /// has elapsed at `now`. Returns true if a report was emitted.
    pub fn flush_if_due(&self, now: Instant, report: Option<&ReportLog>) -> bool {
        {
            let mut deadline = self.deadline.lock().unwrap();
            if now < *deadline {
                return false;
            }
            *deadline = now + self.interval;
        }

        let passes = self.passes.swap(0, Ordering::SeqCst);
        let failures = self.failures.swap(0, Ordering::SeqCst);
        info!(passes, failures, "interim audit report");
        if let Some(report) = report {
            report.emit(&ReportEvent::InterimReport {
                timestamp: now_rfc3339(),
                passes,
                failures,
            });
        }
        true
    }

    fn maybe_flush(&self, report: Option<&ReportLog>) {
        self.flush_if_due(Instant::now(), report);
    }
}

/// Drives audit passes over a configured device tree
pub struct Sweeper<'a, O: BrokerOpener> {
    config: &'a AuditConfig,
    opener: &'a O,
    mounts: &'a dyn MountCheck,
    window: &'a ReportWindow,
    shutdown: &'a ShutdownHandle,
    report: Option<&'a ReportLog>,
    limiter: UnitRateLimiter,
}

impl<'a, O: BrokerOpener> Sweeper<'a, O> {
    pub fn new(
        config: &'a AuditConfig,
        opener: &'a O,
        mounts: &'a dyn MountCheck,
        window: &'a ReportWindow,
        shutdown: &'a ShutdownHandle,
        report: Option<&'a ReportLog>,
    ) -> Self {
        Self {
            config,
            opener,
            mounts,
            window,
            shutdown,
            report,
            limiter: UnitRateLimiter::new(config.max_units_per_second),
        }
    }

    /// Run exactly one full sweep.
    ///
    /// Per-unit failures are counted, never propagated; the only
    /// error surfaced here is a fatal enumeration failure (the
    /// devices root itself being unreadable).
    pub fn run_pass(&self) -> Result<SweepStats> {
        let started = Utc::now();
        let begin = Instant::now();

        info!(devices = %self.config.devices.display(), "begin audit pass");
        if let Some(report) = self.report {
            report.emit(&ReportEvent::SweepStart {
                timestamp: now_rfc3339(),
                devices: self.config.devices.display().to_string(),
            });
        }

        let locations = LocationIter::new(
            &self.config.devices,
            &self.config.data_dir,
            &self.config.unit_suffix,
            self.config.mount_check,
            self.mounts,
        )?;

        let (passes, failures, skipped, aborted) = if self.config.workers > 0 {
            self.run_parallel(locations)
        } else {
            self.run_sequential(locations)
        };

        let stats = SweepStats {
            started,
            passes,
            failures,
            skipped,
            elapsed: begin.elapsed(),
            aborted,
        };

        info!(
            passes = stats.passes,
            failures = stats.failures,
            skipped = stats.skipped,
            elapsed_secs = stats.elapsed.as_secs_f64(),
            aborted = stats.aborted,
            "audit pass completed"
        );
        if let Some(report) = self.report {
            report.emit(&ReportEvent::SweepComplete {
                timestamp: now_rfc3339(),
                passes: stats.passes,
                failures: stats.failures,
                skipped: stats.skipped,
                elapsed_secs: stats.elapsed.as_secs_f64(),
                aborted: stats.aborted,
            });
        }

        Ok(stats)
    }

    fn emit_unit_failure(&self, location: &DataUnitLocation) {
        if let Some(report) = self.report {
            report.emit(&ReportEvent::UnitFailure {
                timestamp: now_rfc3339(),
                device: location.device.clone(),
                partition: location.partition.clone(),
                path: location.path.display().to_string(),
            });
        }
    }

    fn run_sequential(&self, locations: LocationIter) -> (u64, u64, u64, bool) {
        let mut passes = 0u64;
        let mut failures = 0u64;
        let mut skipped = 0u64;
        let mut aborted = false;

        for location in locations {
            self.limiter.pace(self.shutdown);
            if self.shutdown.is_requested() {
                aborted = true;
                break;
            }

            let outcome = audit_unit(self.opener, &location);
            self.window.record(outcome);
            match outcome {
                AuditOutcome::Passed => passes += 1,
                AuditOutcome::Failed => {
                    failures += 1;
                    self.emit_unit_failure(&location);
                }
                AuditOutcome::Skipped => skipped += 1,
            }

            self.window.maybe_flush(self.report);
        }

        (passes, failures, skipped, aborted)
    }

    /// Fan locations out over a bounded channel to a fixed pool of
    /// audit threads. The shared counters stay exact: each completed
    /// audit increments exactly one atomic.
    fn run_parallel(&self, locations: LocationIter) -> (u64, u64, u64, bool) {
        let workers = self.config.workers;
        // bounded buffer keeps the generator from racing ahead of
        // the audit threads
        let buffer = workers.max(16).min(1000);
        let (tx, rx) = bounded::<DataUnitLocation>(buffer);

        let passes = AtomicU64::new(0);
        let failures = AtomicU64::new(0);
        let skipped = AtomicU64::new(0);
        let mut aborted = false;

        thread::scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                let passes = &passes;
                let failures = &failures;
                let skipped = &skipped;
                scope.spawn(move || {
                    for location in rx.iter() {
                        if self.shutdown.is_requested() {
                            break;
                        }
                        let outcome = audit_unit(self.opener, &location);
                        self.window.record(outcome);
                        match outcome {
                            AuditOutcome::Passed => {
                                passes.fetch_add(1, Ordering::SeqCst);
                            }
                            AuditOutcome::Failed => {
                                failures.fetch_add(1, Ordering::SeqCst);
                                self.emit_unit_failure(&location);
                            }
                            AuditOutcome::Skipped => {
                                skipped.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                });
            }
            drop(rx);

            for location in locations {
                self.limiter.pace(self.shutdown);
                if self.shutdown.is_requested() {
                    aborted = true;
                    break;
                }
                if tx.send(location).is_err() {
                    debug!("audit workers stopped, abandoning generator");
                    aborted = true;
                    break;
                }
                self.window.maybe_flush(self.report);
            }
            drop(tx);
        });

        (
            passes.into_inner(),
            failures.into_inner(),
            skipped.into_inner(),
            aborted,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::broker::{ReplicaFileBroker, ReplicaFileOpener};
    use std::path::Path;
    use tempfile::tempdir;

    struct AllMounted;

    impl MountCheck for AllMounted {
        fn is_mounted(&self, _path: &Path) -> bool {
            true
        }
    }

    fn populate(root: &Path, device: &str, partition: &str, valid: usize, corrupt: usize) {
        let dir = root.join(device).join("replicas").join(partition);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..valid {
            let path = dir.join(format!("ok{}.db", i));
            ReplicaFileBroker::create(&path, &format!("ok{}", i), b"payload", false).unwrap();
        }
        for i in 0..corrupt {
            let path = dir.join(format!("bad{}.db", i));
            std::fs::write(&path, b"not a valid unit").unwrap();
        }
    }

    fn config_for(root: &Path, workers: usize) -> AuditConfig {
        AuditConfig {
            devices: root.to_path_buf(),
            workers,
            ..Default::default()
        }
    }

    fn sweep(config: &AuditConfig) -> SweepStats {
        let window = ReportWindow::new(config.reporting_interval());
        let shutdown = ShutdownHandle::new();
        let sweeper = Sweeper::new(
            config,
            &ReplicaFileOpener,
            &AllMounted,
            &window,
            &shutdown,
            None,
        );
        sweeper.run_pass().unwrap()
    }

    #[test]
    fn test_sequential_sweep_counts() {
        let dir = tempdir().unwrap();
        populate(dir.path(), "sda", "1001", 3, 1);
        populate(dir.path(), "sda", "1002", 2, 0);

        let stats = sweep(&config_for(dir.path(), 0));
        assert_eq!(stats.passes, 5);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.skipped, 0);
        assert!(!stats.aborted);
    }

    #[test]
    fn test_parallel_sweep_counts_match_sequential() {
        let dir = tempdir().unwrap();
        populate(dir.path(), "sda", "1001", 12, 3);
        populate(dir.path(), "sdb", "2001", 8, 2);

        let sequential = sweep(&config_for(dir.path(), 0));
        let parallel = sweep(&config_for(dir.path(), 4));

        assert_eq!(sequential.passes, 20);
        assert_eq!(sequential.failures, 5);
        assert_eq!(parallel.passes, sequential.passes);
        assert_eq!(parallel.failures, sequential.failures);
    }

    #[test]
    fn test_deleted_units_count_as_neither() {
        let dir = tempdir().unwrap();
        populate(dir.path(), "sda", "1001", 2, 0);
        let tomb = dir
            .path()
            .join("sda")
            .join("replicas")
            .join("1001")
            .join("tomb.db");
        ReplicaFileBroker::create(&tomb, "tomb", b"", true).unwrap();

        let stats = sweep(&config_for(dir.path(), 0));
        assert_eq!(stats.passes, 2);
        assert_eq!(stats.failures, 0);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_shutdown_aborts_sweep() {
        let dir = tempdir().unwrap();
        populate(dir.path(), "sda", "1001", 10, 0);

        let config = config_for(dir.path(), 0);
        let window = ReportWindow::new(config.reporting_interval());
        let shutdown = ShutdownHandle::new();
        shutdown.request();

        let sweeper = Sweeper::new(
            &config,
            &ReplicaFileOpener,
            &AllMounted,
            &window,
            &shutdown,
            None,
        );
        let stats = sweeper.run_pass().unwrap();
        assert!(stats.aborted);
        assert_eq!(stats.passes, 0);
    }

    #[test]
    fn test_missing_devices_root_is_fatal() {
        let dir = tempdir().unwrap();
        let config = config_for(&dir.path().join("missing"), 0);
        let window = ReportWindow::new(config.reporting_interval());
        let shutdown = ShutdownHandle::new();
        let sweeper = Sweeper::new(
            &config,
            &ReplicaFileOpener,
            &AllMounted,
            &window,
            &shutdown,
            None,
        );
        assert!(sweeper.run_pass().is_err());
    }

    #[test]
    fn test_window_not_due_before_interval() {
        let window = ReportWindow::new(Duration::from_secs(3600));
        window.record(AuditOutcome::Passed);
        assert!(!window.flush_if_due(Instant::now(), None));
        assert_eq!(window.counts(), (1, 0));
    }

    #[test]
    fn test_window_flush_resets_counters() {
        let interval = Duration::from_secs(3600);
        let window = ReportWindow::new(interval);
        window.record(AuditOutcome::Passed);
        window.record(AuditOutcome::Passed);
        window.record(AuditOutcome::Failed);
        window.record(AuditOutcome::Skipped);
        assert_eq!(window.counts(), (2, 1));

        let later = Instant::now() + interval * 2;
        assert!(window.flush_if_due(later, None));
        assert_eq!(window.counts(), (0, 0));

        // counts observed after the reset never include earlier units
        window.record(AuditOutcome::Failed);
        assert_eq!(window.counts(), (0, 1));

        // the deadline advanced from the flush instant
        assert!(!window.flush_if_due(later + interval / 2, None));
        assert!(window.flush_if_due(later + interval, None));
    }

    #[test]
    fn test_window_survives_across_sweeps() {
        let dir = tempdir().unwrap();
        populate(dir.path(), "sda", "1001", 2, 1);

        let config = config_for(dir.path(), 0);
        let window = ReportWindow::new(config.reporting_interval());
        let shutdown = ShutdownHandle::new();
        let sweeper = Sweeper::new(
            &config,
            &ReplicaFileOpener,
            &AllMounted,
            &window,
            &shutdown,
            None,
        );

        sweeper.run_pass().unwrap();
        sweeper.run_pass().unwrap();

        // two sweeps accumulated into the same (never-flushed) window
        assert_eq!(window.counts(), (4, 2));
    }
}
