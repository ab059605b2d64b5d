//! Fixed-window rate limiting per client IP.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use usersync_core::Clock;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per client IP in fixed windows.
///
/// A window opens on the first request from an IP and lasts for the
/// configured duration; the next request after it closes opens a new one.
/// Check-and-increment happens under one lock, so concurrent requests cannot
/// both slip past the ceiling.
pub struct RateLimiter {
    window: Duration,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// Creates a limiter.
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request from `ip` and returns whether it is within `limit`.
    ///
    /// A limit of 0 disables limiting and records nothing.
    pub fn check(&self, ip: &str, limit: u32) -> bool {
        if limit == 0 {
            return true;
        }

        let now = self.clock.now();
        let mut windows = self.windows.lock();
        windows.retain(|_, w| now.duration_since(w.started) < self.window);

        match windows.get_mut(ip) {
            None => {
                windows.insert(ip.to_string(), Window { started: now, count: 1 });
                true
            }
            Some(w) if w.count >= limit => false,
            Some(w) => {
                w.count += 1;
                true
            }
        }
    }

    /// Requests recorded for `ip` in its open window.
    pub fn count(&self, ip: &str) -> u32 {
        let now = self.clock.now();
        self.windows
            .lock()
            .get(ip)
            .filter(|w| now.duration_since(w.started) < self.window)
            .map_or(0, |w| w.count)
    }
}
