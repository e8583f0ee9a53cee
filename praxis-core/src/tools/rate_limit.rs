//! Sliding-window admission control
//!
//! Each tool owns its own limiter instance; there is no process-wide
//! table keyed by tool id. The clock is a seam so tests can drive the
//! window deterministically.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Window over which admissions are counted
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Monotonic time source
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Wall-clock backed `Clock`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Per-tool sliding-window rate limiter over the trailing 60 seconds
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish()
    }
}

impl RateLimiter {
    /// Limiter admitting at most `limit` operations per trailing minute
    pub fn new(limit: u32) -> Self {
        Self::with_clock(limit, Arc::new(SystemClock))
    }

    /// Limiter with an injected clock (tests)
    pub fn with_clock(limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit,
            window: RATE_LIMIT_WINDOW,
            clock,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Check admission: evict entries older than the window, reject if the
    /// remaining count has reached the limit, otherwise record and admit.
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now();
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());

        while let Some(front) = timestamps.front() {
            if now.duration_since(*front) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.limit as usize {
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Admissions currently inside the window
    pub fn in_window(&self) -> usize {
        let now = self.clock.now();
        let timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        timestamps
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;

    /// Clock the tests can advance by hand
    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Instant::now()),
            }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    #[test]
    fn test_admits_up_to_limit() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.in_window(), 3);
    }

    #[test]
    fn test_window_eviction_readmits() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(2, clock.clone());

        assert!(limiter.try_acquire());
        clock.advance(Duration::from_secs(10));
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        // First admission ages past 60s, second is still inside.
        clock.advance(Duration::from_secs(51));
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_concurrent_callers_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new(50));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0u32;
                for _ in 0..20 {
                    if limiter.try_acquire() {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 50);
    }
}
