//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests between hand-off from the listener and the final flush
//! - Generate unique request sequence numbers for tracing
//! - Let shutdown wait until every tracked request has finished

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::observability::metrics;

/// Global atomic counter for sequence numbers.
/// Relaxed ordering is sufficient since we only need uniqueness.
static SEQUENCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Monotonic per-process request sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sequence(u64);

impl Sequence {
    pub fn next() -> Self {
        Self(SEQUENCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Tracks in-flight requests for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    active: AtomicU64,
    drained: Notify,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new in-flight request. The guard releases it on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        metrics::request_started();
        ConnectionGuard {
            inner: Arc::clone(&self.inner),
            sequence: Sequence::next(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Wait until no request is in flight.
    pub async fn wait_for_drain(&self) {
        loop {
            let drained = self.inner.drained.notified();
            if self.active_count() == 0 {
                return;
            }
            drained.await;
        }
    }

    /// Wait for the drain, giving up after `limit`. Returns whether it drained.
    pub async fn wait_for_drain_timeout(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.wait_for_drain()).await.is_ok()
    }
}

/// Guard held for the lifetime of one in-flight request.
#[derive(Debug)]
pub struct ConnectionGuard {
    inner: Arc<TrackerInner>,
    sequence: Sequence,
}

impl ConnectionGuard {
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::request_finished();
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.drained.notify_waiters();
        }
        tracing::trace!(sequence = %self.sequence, "Request finished");
    }
}
