//! Latest known snapshot of open positions.
//!
//! The snapshot is an immutable `Arc<Vec<Position>>` swapped as a whole, so
//! readers always hold either the previous complete list or the new one.
//! Refreshes run on their own schedule; the sweep only ever reads.

use parking_lot::RwLock;
use perps_chain::{PerpetualsClient, Position, Pubkey};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduler::{Cadence, Scheduler};
use crate::timeout::with_timeout;

#[derive(Debug, Default)]
pub struct PositionStore {
    snapshot: RwLock<Arc<Vec<Position>>>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Cheap; later refreshes do not affect it.
    pub fn snapshot(&self) -> Arc<Vec<Position>> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn replace(&self, positions: Vec<Position>) {
        *self.snapshot.write() = Arc::new(positions);
    }

    /// Drop one position, publishing a new snapshot without it.
    ///
    /// Returns `false` if the position is not in the current snapshot.
    pub fn remove(&self, address: &Pubkey) -> bool {
        let mut guard = self.snapshot.write();
        if !guard.iter().any(|p| &p.address == address) {
            return false;
        }
        let remaining: Vec<Position> = guard
            .iter()
            .filter(|p| &p.address != address)
            .cloned()
            .collect();
        *guard = Arc::new(remaining);
        true
    }

    /// Fetch every open position and publish them as the new snapshot.
    ///
    /// On failure the previous snapshot stays in place.
    #[instrument(skip_all)]
    pub async fn refresh(
        &self,
        client: &dyn PerpetualsClient,
        call_timeout: Duration,
    ) -> anyhow::Result<usize> {
        let positions = with_timeout(call_timeout, client.list_open_positions()).await?;
        let count = positions.len();
        self.replace(positions);
        debug!(positions = count, "Position snapshot replaced");
        Ok(count)
    }

    /// Refresh every `interval` until `token` is cancelled. Failures are
    /// logged and the loop carries on.
    pub async fn run_refresh(
        self: Arc<Self>,
        client: Arc<dyn PerpetualsClient>,
        interval: Duration,
        call_timeout: Duration,
        token: CancellationToken,
    ) {
        let scheduler = Scheduler::new("position-refresh", Cadence::FixedInterval(interval), token);
        scheduler
            .run(|_| {
                let store = Arc::clone(&self);
                let client = Arc::clone(&client);
                async move {
                    match store.refresh(client.as_ref(), call_timeout).await {
                        Ok(count) => info!(positions = count, "Refreshed positions to track"),
                        Err(e) => warn!(error = %e, "Position refresh failed, keeping last snapshot"),
                    }
                }
            })
            .await;
    }
}
