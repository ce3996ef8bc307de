//! Custody lookups, fetched once per address and kept for the process
//! lifetime.
//!
//! Custody configuration (mint, oracle account) is treated as immutable
//! while the bot runs. There is deliberately no eviction: if a custody is
//! reconfigured on-chain the bot must be restarted to pick it up.
//!
//! Concurrent lookups of the same address share one in-flight fetch. A
//! failed fetch is not cached; the next lookup tries again.

use dashmap::DashMap;
use perps_chain::{ChainResult, Custody, PerpetualsClient, Pubkey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::timeout::with_timeout;

pub struct CustodyCache {
    client: Arc<dyn PerpetualsClient>,
    entries: DashMap<Pubkey, Arc<OnceCell<Arc<Custody>>>>,
    call_timeout: Duration,
}

impl CustodyCache {
    pub fn new(client: Arc<dyn PerpetualsClient>, call_timeout: Duration) -> Self {
        Self {
            client,
            entries: DashMap::new(),
            call_timeout,
        }
    }

    pub async fn get(&self, address: Pubkey) -> ChainResult<Arc<Custody>> {
        // Clone the cell out so the map shard is not locked across the fetch.
        let cell = Arc::clone(&*self.entries.entry(address).or_default());

        let custody = cell
            .get_or_try_init(|| async move {
                let custody =
                    with_timeout(self.call_timeout, self.client.fetch_custody(address)).await?;
                debug!(custody = %address, mint = %custody.mint, "Custody cached");
                Ok::<_, perps_chain::ChainError>(Arc::new(custody))
            })
            .await?;
        Ok(Arc::clone(custody))
    }

    /// Number of custodies resolved so far.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CustodyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyCache")
            .field("cached", &self.len())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}
