/*!
 * Audit pacing with token bucket rate limiting
 *
 * Keeps the auditor a low-priority consumer of disk bandwidth by
 * capping how many units are audited per second.
 */

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::num::NonZeroU32;
use std::thread;
use std::time::Duration;

use super::shutdown::ShutdownHandle;

/// Per-unit rate limiter using a token bucket
pub struct UnitRateLimiter {
    limiter: Option<GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl UnitRateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_units_per_second` - Maximum audited units per second (0 = unlimited)
    pub fn new(max_units_per_second: u32) -> Self {
        let limiter = NonZeroU32::new(max_units_per_second)
            .map(|rate| GovernorRateLimiter::direct(Quota::per_second(rate)));
        Self { limiter }
    }

    /// Block until the next audit may proceed. Returns early if a
    /// shutdown is requested, so pacing never delays a stop.
    pub fn pace(&self, shutdown: &ShutdownHandle) {
        if let Some(ref limiter) = self.limiter {
            while limiter.check().is_err() {
                if shutdown.is_requested() {
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    /// Check if rate limiting is enabled
    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }
}
