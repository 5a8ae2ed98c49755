/*!
 * Cooperative shutdown signalling
 *
 * A sweep checks the handle between units; the scheduler sleeps
 * through it so an interrupt never has to wait out a full interval.
 */

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Shared shutdown flag with an interruptible sleep.
///
/// Clones share the same underlying flag.
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Arc<Inner>,
}

struct Inner {
    requested: Mutex<bool>,
    signal: Condvar,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                requested: Mutex::new(false),
                signal: Condvar::new(),
            }),
        }
    }

    /// Request shutdown and wake every sleeper
    pub fn request(&self) {
        let mut requested = self.inner.requested.lock().unwrap();
        *requested = true;
        self.inner.signal.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.inner.requested.lock().unwrap()
    }

    /// Sleep for up to `duration`. Returns true if the sleep was cut
    /// short by a shutdown request, false if it ran to completion.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut requested = self.inner.requested.lock().unwrap();
        while !*requested {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .signal
                .wait_timeout(requested, deadline - now)
                .unwrap();
            requested = guard;
        }
        true
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sleep_runs_to_completion() {
        let handle = ShutdownHandle::new();
        let start = Instant::now();
        let interrupted = handle.sleep(Duration::from_millis(30));
        assert!(!interrupted);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_request_before_sleep_returns_immediately() {
        let handle = ShutdownHandle::new();
        handle.request();
        let start = Instant::now();
        assert!(handle.sleep(Duration::from_secs(60)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_request_interrupts_sleep() {
        let handle = ShutdownHandle::new();
        let waker = handle.clone();
        let start = Instant::now();

        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            waker.request();
        });

        assert!(handle.sleep(Duration::from_secs(60)));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(handle.is_requested());
        t.join().unwrap();
    }
}
