//! Time sources for the rate limiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time, expressed as the elapsed duration since some fixed origin.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall-clock provider backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct RealTimeProvider {
    origin: Instant,
}

impl RealTimeProvider {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for RealTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually driven clock with millisecond resolution.
#[derive(Debug, Default)]
pub struct MockTimeProvider {
    millis: AtomicU64,
}

impl MockTimeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, at: Duration) {
        self.millis.store(at.as_millis() as u64, Ordering::SeqCst);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_only_moves_when_told() {
        let clock = MockTimeProvider::new();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), Duration::from_millis(1500));

        clock.set(Duration::from_secs(10));
        assert_eq!(clock.now(), Duration::from_secs(10));
    }

    #[test]
    fn real_clock_is_monotonic() {
        let clock = RealTimeProvider::new();
        let first = clock.now();
        assert!(clock.now() >= first);
    }
}
