//! Sliding-window admission control for submissions.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Per-key sliding window: at most `max` admissions within any trailing
/// `window`. A rejected call is not recorded, so it does not extend the
/// caller's lockout.
///
/// Keys are never evicted; the map grows with the number of distinct
/// callers seen.
#[derive(Debug)]
pub struct RateLimiter {
    max: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        let admitted = hits.entry(key.to_string()).or_default();

        if let Some(cutoff) = now.checked_sub(self.window) {
            while admitted.front().is_some_and(|t| *t <= cutoff) {
                admitted.pop_front();
            }
        }
        if admitted.len() >= self.max {
            return false;
        }
        admitted.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn sixth_call_in_window_is_rejected() {
        let limiter = RateLimiter::new(5, MINUTE);
        let t0 = Instant::now();
        for i in 0..5 {
            assert!(limiter.allow_at("1.2.3.4", t0 + Duration::from_secs(i)));
        }
        assert!(!limiter.allow_at("1.2.3.4", t0 + Duration::from_secs(10)));
    }

    #[test]
    fn slot_frees_when_oldest_leaves_window() {
        let limiter = RateLimiter::new(2, MINUTE);
        let t0 = Instant::now();
        assert!(limiter.allow_at("k", t0));
        assert!(limiter.allow_at("k", t0 + Duration::from_secs(30)));
        assert!(!limiter.allow_at("k", t0 + Duration::from_secs(59)));

        // The oldest admission is exactly one window old: it no longer counts.
        assert!(limiter.allow_at("k", t0 + MINUTE));
        assert!(!limiter.allow_at("k", t0 + MINUTE + Duration::from_secs(1)));
    }

    #[test]
    fn rejections_do_not_extend_lockout() {
        let limiter = RateLimiter::new(1, MINUTE);
        let t0 = Instant::now();
        assert!(limiter.allow_at("k", t0));
        for s in 1..60 {
            assert!(!limiter.allow_at("k", t0 + Duration::from_secs(s)));
        }
        assert!(limiter.allow_at("k", t0 + MINUTE));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, MINUTE);
        let t0 = Instant::now();
        assert!(limiter.allow_at("a", t0));
        assert!(limiter.allow_at("b", t0));
        assert!(!limiter.allow_at("a", t0));
        assert!(!limiter.allow_at("b", t0));
    }
}
