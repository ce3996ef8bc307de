//! Repeat-with-delay driver shared by the sweep and the background tasks.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Run once per period, first run one period after start. Missed
    /// periods are not caught up.
    FixedInterval(Duration),
    /// Run back to back, with at least this long between iteration starts.
    MinimumDelay(Duration),
}

/// Cancellable loop around an async task body.
///
/// Cancellation is observed between iterations and while waiting; a running
/// iteration is never interrupted.
#[derive(Debug, Clone)]
pub struct Scheduler {
    name: &'static str,
    cadence: Cadence,
    token: CancellationToken,
    max_iterations: Option<u64>,
}

impl Scheduler {
    pub fn new(name: &'static str, cadence: Cadence, token: CancellationToken) -> Self {
        Self {
            name,
            cadence,
            token,
            max_iterations: None,
        }
    }

    /// Stop after `n` iterations.
    pub fn with_max_iterations(mut self, n: u64) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Drive `tick` until cancelled or the iteration cap is reached.
    /// `tick` receives the zero-based iteration index. Returns how many
    /// iterations ran.
    pub async fn run<F, Fut>(&self, mut tick: F) -> u64
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        let completed = match self.cadence {
            Cadence::FixedInterval(period) => self.run_fixed(period, &mut tick).await,
            Cadence::MinimumDelay(delay) => self.run_min_delay(delay, &mut tick).await,
        };
        debug!(task = self.name, iterations = completed, "Scheduler stopped");
        completed
    }

    fn exhausted(&self, completed: u64) -> bool {
        self.token.is_cancelled() || self.max_iterations.is_some_and(|max| completed >= max)
    }

    async fn run_fixed<F, Fut>(&self, period: Duration, tick: &mut F) -> u64
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut completed = 0;
        while !self.exhausted(completed) {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = interval.tick() => {}
            }
            tick(completed).await;
            completed += 1;
        }
        completed
    }

    async fn run_min_delay<F, Fut>(&self, delay: Duration, tick: &mut F) -> u64
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut completed = 0;
        while !self.exhausted(completed) {
            let started = Instant::now();
            tick(completed).await;
            completed += 1;

            if self.exhausted(completed) {
                break;
            }
            let remaining = delay.saturating_sub(started.elapsed());
            if !remaining.is_zero() {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => break,
                    _ = tokio::time::sleep(remaining) => {}
                }
            }
        }
        completed
    }
}
