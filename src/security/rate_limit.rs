//! Sliding-window rate limiting.
//!
//! # Responsibilities
//! - Track recent request timestamps per identity (user or remote address)
//! - Throttle an identity for a penalty period once it exceeds the window limit
//! - Evict idle identities so the table does not grow without bound
//! - Reject throttled requests with 429 before the endpoint runs
//!
//! # Design Decisions
//! - Sharded map; the check and the update for one identity happen under that
//!   identity's entry lock, so N concurrent requests admit exactly `max_requests`
//! - A throttled identity's timestamps are cleared, so admission resumes as soon
//!   as the penalty ends
//! - Rejected requests are not recorded

use std::collections::VecDeque;
use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use http::StatusCode;

use crate::config::RateLimitConfig;
use crate::http::{ListenerContext, Response};
use crate::observability::metrics;
use crate::pipeline::{Endpoint, RequestScope, Service};
use crate::security::clock::{RealTimeProvider, TimeProvider};

/// The identity a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateLimitKey {
    User(String),
    Address(IpAddr),
}

impl RateLimitKey {
    /// Metric label for the key kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RateLimitKey::User(_) => "user",
            RateLimitKey::Address(_) => "address",
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitKey::User(id) => write!(f, "user:{id}"),
            RateLimitKey::Address(ip) => write!(f, "address:{ip}"),
        }
    }
}

/// Resolved limiter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub max_requests: usize,
    pub window: Duration,
    pub penalty: Duration,
    pub sweep_interval: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self::from(&RateLimitConfig::default())
    }
}

impl From<&RateLimitConfig> for RateLimitSettings {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            penalty: Duration::from_secs(config.penalty_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }
}

/// Per-identity limiter state.
#[derive(Debug, Clone, Default)]
pub struct RateLimitUserInfo {
    request_times: VecDeque<Duration>,
    limited_until: Option<Duration>,
}

impl RateLimitUserInfo {
    pub fn request_times(&self) -> impl Iterator<Item = Duration> + '_ {
        self.request_times.iter().copied()
    }

    pub fn limited_until(&self) -> Option<Duration> {
        self.limited_until
    }

    /// Record a request at `now`. Returns `true` when it must be rejected.
    fn record(&mut self, now: Duration, settings: &RateLimitSettings) -> bool {
        while let Some(&oldest) = self.request_times.front() {
            if now.saturating_sub(oldest) < settings.window {
                break;
            }
            self.request_times.pop_front();
        }

        if let Some(until) = self.limited_until {
            if now < until {
                return true;
            }
            self.limited_until = None;
        }

        self.request_times.push_back(now);
        if self.request_times.len() > settings.max_requests {
            self.limited_until = Some(now + settings.penalty);
            self.request_times.clear();
            return true;
        }

        false
    }

    fn is_idle(&self, now: Duration, settings: &RateLimitSettings) -> bool {
        let throttled = self.limited_until.is_some_and(|until| now < until);
        let recent = self
            .request_times
            .back()
            .is_some_and(|&last| now.saturating_sub(last) < settings.window);
        !throttled && !recent
    }
}

/// Decides whether an identity has exceeded its allowance.
pub trait RateLimiter: Send + Sync {
    /// Count a request against `key`. Returns `true` when it must be rejected.
    fn violates_rate_limit(&self, key: &RateLimitKey) -> bool;
}

/// Sliding-window limiter with a penalty period.
pub struct SlidingWindowRateLimiter {
    settings: RateLimitSettings,
    clock: Arc<dyn TimeProvider>,
    identities: DashMap<RateLimitKey, RateLimitUserInfo>,
    last_sweep_ms: AtomicU64,
}

impl SlidingWindowRateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self::with_clock(settings, Arc::new(RealTimeProvider::new()))
    }

    pub fn with_clock(settings: RateLimitSettings, clock: Arc<dyn TimeProvider>) -> Self {
        let now_ms = clock.now().as_millis() as u64;
        Self {
            settings,
            clock,
            identities: DashMap::new(),
            last_sweep_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.identities.len()
    }

    /// Snapshot of one identity's state.
    pub fn user_info(&self, key: &RateLimitKey) -> Option<RateLimitUserInfo> {
        self.identities.get(key).map(|info| info.value().clone())
    }

    /// Drop identities with no recent requests and no active penalty.
    pub fn sweep(&self) {
        let now = self.clock.now();
        let before = self.identities.len();
        self.identities
            .retain(|_, info| !info.is_idle(now, &self.settings));
        let evicted = before.saturating_sub(self.identities.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle rate limit entries");
        }
    }

    fn sweep_if_due(&self, now: Duration) {
        let now_ms = now.as_millis() as u64;
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < self.settings.sweep_interval.as_millis() as u64 {
            return;
        }
        // One caller wins the sweep; the rest carry on.
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.sweep();
        }
    }
}

impl RateLimiter for SlidingWindowRateLimiter {
    fn violates_rate_limit(&self, key: &RateLimitKey) -> bool {
        let now = self.clock.now();
        self.sweep_if_due(now);

        let mut info = self.identities.entry(key.clone()).or_default();
        info.record(now, &self.settings)
    }
}

impl fmt::Debug for SlidingWindowRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowRateLimiter")
            .field("settings", &self.settings)
            .field("tracked_identities", &self.identities.len())
            .finish()
    }
}

/// Rejects over-limit requests with 429 before the endpoint runs.
///
/// Authenticated requests are counted against the user, everything else against
/// the remote address.
pub struct RateLimitService {
    limiter: Arc<dyn RateLimiter>,
}

impl RateLimitService {
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self { limiter }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(Arc::new(SlidingWindowRateLimiter::new(config.into())))
    }
}

impl Service for RateLimitService {
    fn name(&self) -> &str {
        "rate-limit"
    }

    fn on_request_handled(
        &self,
        context: &ListenerContext,
        _endpoint: &Endpoint,
        scope: &RequestScope,
    ) -> Option<Response> {
        let key = match scope.user(context) {
            Some(user) => RateLimitKey::User(user.user_id()),
            None => RateLimitKey::Address(context.remote_addr().ip()),
        };

        if !self.limiter.violates_rate_limit(&key) {
            return None;
        }

        tracing::warn!(client = %key, path = %context.path(), "Rate limit exceeded");
        metrics::record_rate_limited(key.kind());
        Some(Response::text("Too Many Requests").with_status(StatusCode::TOO_MANY_REQUESTS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::clock::MockTimeProvider;
    use std::net::Ipv4Addr;

    fn settings(max_requests: usize) -> RateLimitSettings {
        RateLimitSettings {
            max_requests,
            window: Duration::from_secs(30),
            penalty: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
        }
    }

    fn limiter(max_requests: usize) -> (SlidingWindowRateLimiter, Arc<MockTimeProvider>) {
        let clock = Arc::new(MockTimeProvider::new());
        let limiter = SlidingWindowRateLimiter::with_clock(settings(max_requests), clock.clone());
        (limiter, clock)
    }

    fn address() -> RateLimitKey {
        RateLimitKey::Address(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[test]
    fn defaults_follow_config() {
        let settings = RateLimitSettings::default();
        assert_eq!(settings.max_requests, 400);
        assert_eq!(settings.window, Duration::from_secs(30));
        assert_eq!(settings.penalty, Duration::from_secs(30));
    }

    #[test]
    fn request_after_max_is_rejected() {
        let (limiter, _clock) = limiter(5);
        for _ in 0..5 {
            assert!(!limiter.violates_rate_limit(&address()));
        }
        assert!(limiter.violates_rate_limit(&address()));
    }

    #[test]
    fn penalty_holds_then_expires() {
        let (limiter, clock) = limiter(2);
        assert!(!limiter.violates_rate_limit(&address()));
        assert!(!limiter.violates_rate_limit(&address()));
        assert!(limiter.violates_rate_limit(&address()));

        let info = limiter.user_info(&address()).unwrap();
        assert_eq!(info.limited_until(), Some(Duration::from_secs(30)));
        assert_eq!(info.request_times().count(), 0);

        clock.advance(Duration::from_secs(29));
        assert!(limiter.violates_rate_limit(&address()));

        clock.advance(Duration::from_secs(1));
        assert!(!limiter.violates_rate_limit(&address()));
    }

    #[test]
    fn old_requests_leave_the_window() {
        let (limiter, clock) = limiter(2);
        assert!(!limiter.violates_rate_limit(&address()));
        assert!(!limiter.violates_rate_limit(&address()));

        clock.advance(Duration::from_secs(30));
        assert!(!limiter.violates_rate_limit(&address()));
        assert!(!limiter.violates_rate_limit(&address()));
        assert_eq!(limiter.user_info(&address()).unwrap().request_times().count(), 2);
    }

    #[test]
    fn identities_are_counted_separately() {
        let (limiter, _clock) = limiter(1);
        let user = RateLimitKey::User("alice".into());
        assert!(!limiter.violates_rate_limit(&user));
        assert!(!limiter.violates_rate_limit(&address()));
        assert!(limiter.violates_rate_limit(&user));
    }

    #[test]
    fn idle_identities_are_swept() {
        let (limiter, clock) = limiter(10);
        limiter.violates_rate_limit(&RateLimitKey::User("idle".into()));
        assert_eq!(limiter.tracked_identities(), 1);

        clock.advance(Duration::from_secs(61));
        limiter.violates_rate_limit(&address());
        assert_eq!(limiter.tracked_identities(), 1);
        assert!(limiter.user_info(&RateLimitKey::User("idle".into())).is_none());
    }

    #[test]
    fn throttled_identities_survive_sweeps() {
        let (limiter, clock) = limiter(1);
        let user = RateLimitKey::User("noisy".into());
        limiter.violates_rate_limit(&user);
        limiter.violates_rate_limit(&user);

        clock.advance(Duration::from_secs(20));
        limiter.sweep();
        assert!(limiter.user_info(&user).is_some());
    }

    #[test]
    fn concurrent_requests_admit_exactly_max() {
        let (limiter, _clock) = limiter(50);
        let admitted = AtomicU64::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        if !limiter.violates_rate_limit(&address()) {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 50);
    }
}
