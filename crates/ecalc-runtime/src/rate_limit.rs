//! Per-caller sliding-window rate limiter

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Sliding-window limiter keyed by caller
///
/// Each caller keeps the instants of its accepted calls inside the window;
/// a call is accepted while fewer than `max_requests` remain. Idle callers
/// are pruned at most once per window, from inside [`RateLimiter::check_at`].
#[derive(Debug)]
pub struct RateLimiter {
    requests: DashMap<String, VecDeque<Instant>>,
    window: Duration,
    max_requests: u32,
    origin: Instant,
    /// Milliseconds after `origin` of the last prune
    last_cleanup: AtomicU64,
}

impl RateLimiter {
    /// Create limiter
    #[must_use]
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            requests: DashMap::new(),
            window,
            max_requests,
            origin: Instant::now(),
            last_cleanup: AtomicU64::new(0),
        }
    }

    /// Create limiter over a one-minute window
    #[inline]
    #[must_use]
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(Duration::from_secs(60), max_requests)
    }

    /// Record a call now if allowed
    ///
    /// # Errors
    /// Returns the time until a slot frees up
    pub fn check(&self, caller: &str) -> Result<(), Duration> {
        self.check_at(caller, Instant::now())
    }

    /// Record a call at `now` if allowed
    ///
    /// # Errors
    /// Returns the time until a slot frees up
    pub fn check_at(&self, caller: &str, now: Instant) -> Result<(), Duration> {
        // Before taking the entry, retain locks every shard
        self.maybe_cleanup(now);

        let mut entry = self.requests.entry(caller.to_string()).or_default();

        while entry
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= self.window)
        {
            entry.pop_front();
        }

        if entry.len() >= self.max_requests as usize {
            let oldest = entry.front().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.saturating_duration_since(oldest));
            return Err(retry_after);
        }

        entry.push_back(now);
        Ok(())
    }

    /// Calls still counted for `caller`
    #[must_use]
    pub fn in_window(&self, caller: &str) -> usize {
        self.requests.get(caller).map_or(0, |e| e.len())
    }

    /// Drop callers with no calls inside the window
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        let before = self.requests.len();
        self.requests.retain(|_, calls| {
            calls.retain(|&t| now.saturating_duration_since(t) < self.window);
            !calls.is_empty()
        });
        tracing::debug!(
            "Rate limiter pruned {} idle callers",
            before.saturating_sub(self.requests.len())
        );
    }

    /// Prune once a full window has passed since the last prune
    fn maybe_cleanup(&self, now: Instant) {
        let elapsed = u64::try_from(now.saturating_duration_since(self.origin).as_millis())
            .unwrap_or(u64::MAX);
        let interval = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX);
        let last = self.last_cleanup.load(Ordering::Relaxed);

        if elapsed.saturating_sub(last) < interval {
            return;
        }
        if self
            .last_cleanup
            .compare_exchange(last, elapsed, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            self.cleanup_at(now);
        }
    }

    /// Number of tracked callers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if no callers are tracked
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = RateLimiter::per_minute(3);
        let start = Instant::now();
        for i in 0..3 {
            assert!(limiter.check_at("admin", start + Duration::from_secs(i)).is_ok());
        }
        let retry = limiter
            .check_at("admin", start + Duration::from_secs(10))
            .unwrap_err();
        assert_eq!(retry, Duration::from_secs(50));
        assert_eq!(limiter.in_window("admin"), 3);
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::per_minute(2);
        let start = Instant::now();
        limiter.check_at("a", start).unwrap();
        limiter.check_at("a", start + Duration::from_secs(30)).unwrap();
        assert!(limiter.check_at("a", start + Duration::from_secs(59)).is_err());
        // First call has left the window
        assert!(limiter.check_at("a", start + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn callers_are_independent() {
        let limiter = RateLimiter::per_minute(1);
        let now = Instant::now();
        assert!(limiter.check_at("a", now).is_ok());
        assert!(limiter.check_at("b", now).is_ok());
        assert!(limiter.check_at("a", now).is_err());
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn rejected_calls_are_not_recorded() {
        let limiter = RateLimiter::per_minute(1);
        let now = Instant::now();
        limiter.check_at("a", now).unwrap();
        for _ in 0..5 {
            let _ = limiter.check_at("a", now);
        }
        assert_eq!(limiter.in_window("a"), 1);
    }

    #[test]
    fn cleanup_drops_idle_callers() {
        let limiter = RateLimiter::new(Duration::from_millis(1), 10);
        limiter.check("a").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        limiter.cleanup();
        assert!(limiter.is_empty());
    }

    #[test]
    fn idle_callers_are_pruned_by_later_checks() {
        let limiter = RateLimiter::per_minute(5);
        let start = Instant::now();
        for caller in ["a", "b", "c"] {
            limiter.check_at(caller, start).unwrap();
        }
        assert_eq!(limiter.len(), 3);

        // Within the window nothing is pruned
        limiter.check_at("d", start + Duration::from_secs(30)).unwrap();
        assert_eq!(limiter.len(), 4);

        // A window later only callers with recent calls remain
        limiter.check_at("e", start + Duration::from_secs(61)).unwrap();
        assert_eq!(limiter.len(), 2);
        assert_eq!(limiter.in_window("a"), 0);
        assert_eq!(limiter.in_window("d"), 1);
    }
}
