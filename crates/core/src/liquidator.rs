//! Liquidation sweep: walk the position snapshot, ask the program about
//! each position and liquidate the ones it reports as eligible.

use perps_api::Notifier;
use perps_chain::{ChainError, Custody, PerpetualsClient, Position, Signature};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SweepTimingConfig;
use crate::custody_cache::CustodyCache;
use crate::position_store::PositionStore;
use crate::scheduler::{Cadence, Scheduler};
use crate::timeout::with_timeout;

/// Result of one liquidation submission.
#[derive(Debug)]
pub enum SubmitOutcome {
    Submitted(Signature),
    Failed(ChainError),
}

/// What happened to one position during a cycle.
#[derive(Debug)]
pub enum PositionOutcome {
    /// The program reported the position as not liquidatable.
    Healthy,
    /// The position account no longer exists; it was dropped from the store.
    Closed,
    /// Custody lookup or evaluation failed; retried next cycle.
    EvaluationFailed(ChainError),
    /// Eligible, and a liquidation was attempted.
    Attempted(SubmitOutcome),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Positions visited, whatever their outcome
    pub checked: usize,
    /// Positions found eligible (a submission was attempted)
    pub liquidated: usize,
    pub failed_submissions: usize,
    pub evaluation_errors: usize,
    pub closed: usize,
    pub duration: Duration,
}

impl CycleSummary {
    fn record(&mut self, outcome: &PositionOutcome) {
        self.checked += 1;
        match outcome {
            PositionOutcome::Healthy => {}
            PositionOutcome::Closed => self.closed += 1,
            PositionOutcome::EvaluationFailed(_) => self.evaluation_errors += 1,
            PositionOutcome::Attempted(submit) => {
                self.liquidated += 1;
                if matches!(submit, SubmitOutcome::Failed(_)) {
                    self.failed_submissions += 1;
                }
            }
        }
    }
}

/// Sweep loop over the position store.
pub struct Liquidator {
    /// Program access, shared with the store refresh and custody cache
    client: Arc<dyn PerpetualsClient>,

    /// Source of candidate positions
    store: Arc<PositionStore>,

    custodies: CustodyCache,

    notifier: Notifier,

    /// Upper bound on each evaluation or submission
    call_timeout: Duration,

    /// Floor on the time between cycle starts
    min_cycle_delay: Duration,
}

impl Liquidator {
    pub fn new(
        client: Arc<dyn PerpetualsClient>,
        store: Arc<PositionStore>,
        notifier: Notifier,
        timing: &SweepTimingConfig,
    ) -> Self {
        let call_timeout = timing.call_timeout();
        Self {
            custodies: CustodyCache::new(Arc::clone(&client), call_timeout),
            client,
            store,
            notifier,
            call_timeout,
            min_cycle_delay: timing.min_cycle_delay(),
        }
    }

    pub fn custodies(&self) -> &CustodyCache {
        &self.custodies
    }

    /// Run cycles back to back until `token` is cancelled, or for at most
    /// `max_cycles` cycles. Returns the number of cycles completed.
    pub async fn run(&self, token: CancellationToken, max_cycles: Option<u64>) -> u64 {
        let mut scheduler =
            Scheduler::new("sweep", Cadence::MinimumDelay(self.min_cycle_delay), token);
        if let Some(max) = max_cycles {
            scheduler = scheduler.with_max_iterations(max);
        }
        info!(
            liquidator = %self.client.liquidator(),
            min_cycle_delay_ms = self.min_cycle_delay.as_millis() as u64,
            "Starting liquidation sweep"
        );
        scheduler
            .run(|_| async move {
                self.run_cycle().await;
            })
            .await
    }

    /// One pass over the current snapshot. Never fails; per-position errors
    /// are counted in the summary.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleSummary {
        let started = Instant::now();
        let positions = self.store.snapshot();
        let mut summary = CycleSummary::default();

        for position in positions.iter() {
            let outcome = self.process(position).await;
            if matches!(outcome, PositionOutcome::Closed) {
                self.store.remove(&position.address);
            }
            summary.record(&outcome);
        }

        summary.duration = started.elapsed();
        info!(
            checked = summary.checked,
            liquidated = summary.liquidated,
            failed_submissions = summary.failed_submissions,
            evaluation_errors = summary.evaluation_errors,
            closed = summary.closed,
            duration_ms = summary.duration.as_millis() as u64,
            "Checked {} positions and liquidated {} of them in {:.2}s",
            summary.checked,
            summary.liquidated,
            summary.duration.as_secs_f64()
        );
        summary
    }

    async fn process(&self, position: &Position) -> PositionOutcome {
        let custody = match self.custodies.get(position.custody).await {
            Ok(custody) => custody,
            Err(e) => {
                warn!(
                    position = %position.address,
                    custody = %position.custody,
                    error = %e,
                    "Failed to load custody"
                );
                return PositionOutcome::EvaluationFailed(e);
            }
        };

        let state = match with_timeout(
            self.call_timeout,
            self.client.evaluate_liquidation(position, &custody),
        )
        .await
        {
            Ok(state) => state,
            Err(ChainError::PositionClosed(_)) => {
                info!(position = %position.address, "Position closed, removing");
                return PositionOutcome::Closed;
            }
            Err(e) => {
                warn!(
                    position = %position.address,
                    transient = e.is_transient(),
                    error = %e,
                    "Failed to evaluate position"
                );
                return PositionOutcome::EvaluationFailed(e);
            }
        };

        if !state.is_liquidatable() {
            debug!(position = %position.address, "Position healthy");
            return PositionOutcome::Healthy;
        }

        self.notifier
            .notify(format!("Found position to liquidate: {}", position.address));
        PositionOutcome::Attempted(self.submit(position, &custody).await)
    }

    #[instrument(skip_all, fields(position = %position.address, pool = %position.pool))]
    async fn submit(&self, position: &Position, custody: &Custody) -> SubmitOutcome {
        match with_timeout(
            self.call_timeout,
            self.client.submit_liquidation(position, custody),
        )
        .await
        {
            Ok(signature) => {
                info!(signature = %signature, "Liquidation confirmed");
                self.notifier
                    .notify(format!("Liquidated position with tx: {signature}"));
                SubmitOutcome::Submitted(signature)
            }
            Err(e) => {
                warn!(error = %e, "Liquidation failed");
                self.notifier.notify(format!(
                    "Failed to liquidate position {}: {e}",
                    position.address
                ));
                SubmitOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Evaluation, FakeClient};

    fn timing() -> SweepTimingConfig {
        SweepTimingConfig {
            min_cycle_delay_ms: 1000,
            call_timeout_secs: 5,
        }
    }

    async fn liquidator_for(client: &Arc<FakeClient>) -> (Liquidator, Arc<PositionStore>) {
        let store = Arc::new(PositionStore::new());
        store
            .refresh(client.as_ref(), Duration::from_secs(5))
            .await
            .unwrap();
        let liquidator = Liquidator::new(
            client.clone(),
            Arc::clone(&store),
            Notifier::disabled(),
            &timing(),
        );
        (liquidator, store)
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let client = Arc::new(FakeClient::new());
        let (liquidator, _) = liquidator_for(&client).await;

        let summary = liquidator.run_cycle().await;
        assert_eq!(summary.checked, 0);
        assert_eq!(summary.liquidated, 0);
    }

    #[tokio::test]
    async fn test_all_healthy_submits_nothing() {
        let (client, _) = FakeClient::new().with_positions(3);
        let client = Arc::new(client);
        let (liquidator, _) = liquidator_for(&client).await;

        let summary = liquidator.run_cycle().await;
        assert_eq!(summary.checked, 3);
        assert_eq!(summary.liquidated, 0);
        assert!(client.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_single_eligible_position_is_liquidated() {
        let (client, positions) = FakeClient::new().with_positions(3);
        client.set_evaluation(&positions[1], Evaluation::Liquidatable);
        let client = Arc::new(client);
        let (liquidator, _) = liquidator_for(&client).await;

        let summary = liquidator.run_cycle().await;
        assert_eq!(summary.checked, 3);
        assert_eq!(summary.liquidated, 1);
        assert_eq!(summary.failed_submissions, 0);
        assert_eq!(client.submitted(), vec![positions[1].address]);
    }

    #[tokio::test]
    async fn test_evaluation_error_is_isolated() {
        let (client, positions) = FakeClient::new().with_positions(5);
        client.set_evaluation(&positions[0], Evaluation::Liquidatable);
        client.set_evaluation(&positions[2], Evaluation::Fails);
        client.set_evaluation(&positions[3], Evaluation::Liquidatable);
        let client = Arc::new(client);
        let (liquidator, _) = liquidator_for(&client).await;

        let summary = liquidator.run_cycle().await;
        assert_eq!(summary.checked, 5);
        assert_eq!(summary.liquidated, 2);
        assert_eq!(summary.evaluation_errors, 1);
        assert_eq!(
            client.submitted(),
            vec![positions[0].address, positions[3].address]
        );
    }

    #[tokio::test]
    async fn test_failed_submission_does_not_stop_sweep() {
        let (client, positions) = FakeClient::new().with_positions(3);
        for position in &positions {
            client.set_evaluation(position, Evaluation::Liquidatable);
        }
        client.fail_submission(&positions[0]);
        let client = Arc::new(client);
        let (liquidator, _) = liquidator_for(&client).await;

        let summary = liquidator.run_cycle().await;
        assert_eq!(summary.liquidated, 3);
        assert_eq!(summary.failed_submissions, 1);
        // Not retried within the cycle.
        assert_eq!(client.submitted().len(), 3);
    }

    #[tokio::test]
    async fn test_closed_position_is_pruned() {
        let (client, positions) = FakeClient::new().with_positions(3);
        client.set_evaluation(&positions[2], Evaluation::Closed);
        let client = Arc::new(client);
        let (liquidator, store) = liquidator_for(&client).await;

        let summary = liquidator.run_cycle().await;
        assert_eq!(summary.checked, 3);
        assert_eq!(summary.closed, 1);
        assert_eq!(summary.evaluation_errors, 0);
        assert_eq!(store.len(), 2);

        let summary = liquidator.run_cycle().await;
        assert_eq!(summary.checked, 2);
        assert_eq!(client.evaluated.lock().len(), 5);
    }

    #[tokio::test]
    async fn test_missing_custody_counts_as_evaluation_error() {
        let (client, mut positions) = FakeClient::new().with_positions(2);
        positions[0].custody = perps_chain::Pubkey::new_unique();
        client.set_positions(positions);
        let client = Arc::new(client);
        let (liquidator, _) = liquidator_for(&client).await;

        let summary = liquidator.run_cycle().await;
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.evaluation_errors, 1);
    }

    #[tokio::test]
    async fn test_custody_fetched_once_across_cycles() {
        let (client, _) = FakeClient::new().with_positions(4);
        let client = Arc::new(client);
        let (liquidator, _) = liquidator_for(&client).await;

        liquidator.run_cycle().await;
        liquidator.run_cycle().await;
        assert_eq!(client.custody_calls(), 1);
        assert_eq!(liquidator.custodies().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_evaluation_times_out() {
        let (client, positions) = FakeClient::new().with_positions(2);
        client.set_evaluation(&positions[0], Evaluation::Hangs);
        client.set_evaluation(&positions[1], Evaluation::Liquidatable);
        let client = Arc::new(client);
        let (liquidator, _) = liquidator_for(&client).await;

        let summary = liquidator.run_cycle().await;
        assert_eq!(summary.evaluation_errors, 1);
        assert_eq!(summary.liquidated, 1);
        assert!(summary.duration >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_respects_minimum_cycle_delay() {
        let client = Arc::new(FakeClient::new());
        let (liquidator, _) = liquidator_for(&client).await;

        let started = Instant::now();
        let cycles = liquidator.run(CancellationToken::new(), Some(3)).await;
        assert_eq!(cycles, 3);
        // Three empty cycles: two full delays between their starts.
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
