/*!
 * Scheduler: batch and service operating modes
 *
 * Service mode is a two-state machine (sleeping/sweeping). Each
 * cycle self-paces to the configured cadence: a sweep shorter than
 * the interval is followed by a sleep for the remainder, a sweep
 * that overran starts the next one immediately. Startup adds a
 * random jitter so a fleet of identical daemons deployed together
 * does not hit the storage substrate in lockstep on every cycle.
 */

use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::error::Result;

use super::broker::BrokerOpener;
use super::shutdown::ShutdownHandle;
use super::sweep::{SweepStats, Sweeper};

/// Remaining sleep after a sweep, pinned at zero once the sweep has
/// already consumed the whole interval
pub fn pause_between(elapsed: Duration, interval: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Uniform random delay in [0, interval) applied before the first
/// service-mode sweep
pub fn startup_jitter(interval: Duration) -> Duration {
    if interval.is_zero() {
        return Duration::ZERO;
    }
    interval.mul_f64(rand::random::<f64>())
}

/// Batch mode: exactly one sweep, then return its statistics.
///
/// Per-unit failures are data, not process failures; only a fatal
/// enumeration error is surfaced.
pub fn run_once<O: BrokerOpener>(sweeper: &Sweeper<O>) -> Result<SweepStats> {
    sweeper.run_pass()
}

/// Service mode: sweep forever, pacing each cycle to `interval`,
/// until a shutdown is requested.
///
/// A fatal sweep error is logged and the loop still enters the
/// inter-pass sleep before retrying, so a persistently broken
/// devices root cannot become a tight failure loop.
pub fn run_service<O: BrokerOpener>(
    sweeper: &Sweeper<O>,
    interval: Duration,
    shutdown: &ShutdownHandle,
) {
    let jitter = startup_jitter(interval);
    info!(
        seconds = jitter.as_secs_f64(),
        "startup jitter before first audit pass"
    );
    if shutdown.sleep(jitter) {
        return;
    }

    loop {
        let begin = Instant::now();
        match sweeper.run_pass() {
            Ok(stats) => {
                if stats.aborted {
                    info!("shutdown requested, leaving service loop");
                    return;
                }
            }
            Err(err) => {
                error!(error = %err, "audit pass failed");
            }
        }

        let pause = pause_between(begin.elapsed(), interval);
        if pause.is_zero() {
            if shutdown.is_requested() {
                return;
            }
        } else if shutdown.sleep(pause) {
            return;
        }
    }
}
