//! Program address discovery and the background watchers around the sweep.

use anyhow::{Context, Result};
use async_trait::async_trait;
use perps_api::{HealthcheckClient, IdlClient, IdlDescriptor};
use perps_chain::Pubkey;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::scheduler::{Cadence, Scheduler};

/// Somewhere the current program address is published.
#[async_trait]
pub trait ProgramAddressSource: Send + Sync {
    /// `None` when the source is unreachable or has no address.
    async fn program_address(&self) -> Option<String>;
}

#[async_trait]
impl ProgramAddressSource for IdlClient {
    async fn program_address(&self) -> Option<String> {
        self.fetch_program_address().await
    }
}

fn parse_program_id(value: &str) -> Result<Pubkey> {
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid program id {value:?}"))
}

/// Address from the descriptor bundled with the binary.
pub fn bundled_program_id() -> Result<Pubkey> {
    let descriptor = IdlDescriptor::bundled()?;
    let address = descriptor
        .program_address()
        .context("bundled IDL has no program address")?;
    parse_program_id(address)
}

/// Where the program id in use came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramIdOrigin {
    /// `PROGRAM_ID`; never replaced at runtime.
    Override,
    Published,
    Bundled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramId {
    pub address: Pubkey,
    pub origin: ProgramIdOrigin,
}

impl ProgramId {
    /// Whether a newly published address should replace this one.
    pub fn follows_published(&self) -> bool {
        self.origin != ProgramIdOrigin::Override
    }
}

/// Pick the program to liquidate against: an explicit override, else the
/// published descriptor, else the bundled one.
///
/// A malformed override is an error; an unreachable or malformed published
/// address falls back to the bundled one.
pub async fn resolve_program_id(
    override_id: Option<&str>,
    published: Option<&dyn ProgramAddressSource>,
) -> Result<ProgramId> {
    if let Some(value) = override_id {
        let address = parse_program_id(value).context("PROGRAM_ID")?;
        return Ok(ProgramId {
            address,
            origin: ProgramIdOrigin::Override,
        });
    }

    if let Some(source) = published {
        match source.program_address().await.map(|a| parse_program_id(&a)) {
            Some(Ok(address)) => {
                return Ok(ProgramId {
                    address,
                    origin: ProgramIdOrigin::Published,
                })
            }
            Some(Err(e)) => warn!(error = %e, "Ignoring published program address"),
            None => warn!("Published program address unavailable, using bundled IDL"),
        }
    }

    Ok(ProgramId {
        address: bundled_program_id()?,
        origin: ProgramIdOrigin::Bundled,
    })
}

/// Poll `source` until it publishes a valid address different from
/// `current`, then cancel `token`. Returns whether a change was seen.
///
/// Returns at once when `current` is an override. Unreachable sources and
/// malformed addresses are skipped.
pub async fn watch_program_id(
    source: Arc<dyn ProgramAddressSource>,
    current: ProgramId,
    poll_interval: Duration,
    token: CancellationToken,
) -> bool {
    if !current.follows_published() {
        info!(program = %current.address, "Program id overridden, not watching for redeploys");
        return false;
    }

    let changed = Arc::new(AtomicBool::new(false));
    let scheduler = Scheduler::new(
        "program-id-watch",
        Cadence::FixedInterval(poll_interval),
        token.clone(),
    );

    scheduler
        .run(|_| {
            let source = Arc::clone(&source);
            let changed = Arc::clone(&changed);
            let token = token.clone();
            async move {
                let Some(published) = source.program_address().await else {
                    return;
                };
                let address = match parse_program_id(&published) {
                    Ok(address) => address,
                    Err(e) => {
                        warn!(error = %e, "Ignoring published program address");
                        return;
                    }
                };
                if address != current.address {
                    info!(old = %current.address, new = %address, "Found new program address, restarting");
                    changed.store(true, Ordering::SeqCst);
                    token.cancel();
                }
            }
        })
        .await;

    changed.load(Ordering::SeqCst)
}

/// Ping the healthcheck endpoint every `interval` until cancelled.
pub async fn run_healthcheck(
    client: HealthcheckClient,
    interval: Duration,
    token: CancellationToken,
) {
    let scheduler = Scheduler::new("healthcheck", Cadence::FixedInterval(interval), token);
    scheduler
        .run(|_| {
            let client = client.clone();
            async move { client.ping_logged().await }
        })
        .await;
}
