//! Sliding-window rate limiter shared by every outbound RPC request.
//!
//! The public devnet endpoint allows 40 requests per 10 seconds per IP;
//! going over it gets requests rejected and eventually the IP banned.
//! The limiter keeps the timestamps of the grants in the current window
//! and makes callers wait until the oldest one falls out.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Default request budget of the public devnet endpoint.
pub const DEVNET_MAX_REQUESTS: usize = 40;
pub const DEVNET_WINDOW: Duration = Duration::from_secs(10);

pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter granting at most `max_per_window` slots per `window`.
    ///
    /// A zero budget is clamped to one so `acquire` can always make progress.
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        let max_per_window = max_per_window.max(1);
        Self {
            max_per_window,
            window,
            grants: Mutex::new(VecDeque::with_capacity(max_per_window)),
        }
    }

    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a slot is free, then take it.
    ///
    /// The lock is held only while inspecting the window, never across the
    /// sleep, so waiters re-check after waking and a slot is never granted
    /// twice.
    pub async fn acquire(&self) {
        loop {
            let now = Instant::now();
            let mut grants = self.grants.lock().await;
            while let Some(front) = grants.front().copied() {
                if now.duration_since(front) >= self.window {
                    grants.pop_front();
                } else {
                    break;
                }
            }

            if grants.len() < self.max_per_window {
                grants.push_back(now);
                return;
            }

            let wait = grants
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or_default();
            drop(grants);

            trace!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of grants inside the current window.
    pub async fn in_flight(&self) -> usize {
        let now = Instant::now();
        let grants = self.grants.lock().await;
        grants
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_per_window", &self.max_per_window)
            .field("window", &self.window)
            .finish()
    }
}
