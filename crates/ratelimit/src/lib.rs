//! Sliding-window admission control per sender identity.
//!
//! Single-process and in-memory by design: each worker instance limits
//! independently, so multi-instance deployments get approximate
//! (per-instance) limiting rather than global precision. That relaxation
//! is accepted, not assumed away; see the deployment notes in DESIGN.md.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::{Duration, Instant},
};

use tracing::debug;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// When rejected, seconds until the oldest surviving hit leaves the
    /// window and a retry can succeed. Always `Some` when `!allowed`.
    pub retry_after_secs: Option<u64>,
}

impl Decision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after_secs: None,
        }
    }
}

/// In-memory sliding-window limiter keyed by sender identity.
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: usize,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Check and record one request for `key`.
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    /// Clock-injected variant of [`check`](Self::check) for tests.
    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let timestamps = hits.entry(key.to_string()).or_default();

        // Discard hits that have slid out of the window.
        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            // Retry once the oldest surviving hit expires.
            let oldest = timestamps.front().copied().unwrap_or(now);
            let elapsed = now.duration_since(oldest);
            let remaining = self.window.saturating_sub(elapsed);
            let retry_after = remaining.as_secs().max(1);
            debug!(key, retry_after, "rate limit exceeded");
            return Decision {
                allowed: false,
                retry_after_secs: Some(retry_after),
            };
        }

        timestamps.push_back(now);
        Decision::allowed()
    }

    /// Forget all hits for one key.
    pub fn reset(&self, key: &str) {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        hits.remove(key);
    }

    /// Forget everything.
    pub fn reset_all(&self) {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        hits.clear();
    }

    /// Drop keys with no hits inside the window, bounding memory. Stale
    /// empty entries are harmless, only wasteful, so the sweep interval is
    /// a tunable rather than a correctness requirement. Returns the number
    /// of keys removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Clock-injected variant of [`sweep`](Self::sweep) for tests.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let before = hits.len();
        hits.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|&latest| now.duration_since(latest) < self.window)
        });
        before - hits.len()
    }

    /// Number of tracked keys (for diagnostics).
    pub fn tracked_keys(&self) -> usize {
        self.hits.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
