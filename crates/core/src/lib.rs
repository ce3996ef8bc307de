//! Liquidator core logic.
//!
//! This crate provides the core liquidation bot functionality:
//! - Runtime configuration (profiles, TOML files, environment)
//! - Position store with atomic snapshot replacement
//! - Custody cache with request coalescing
//! - Cancellable scheduler for the sweep and background tasks
//! - The liquidation sweep loop
//! - Program address discovery and watchers

pub mod config;
mod custody_cache;
mod liquidator;
mod monitor;
mod position_store;
mod scheduler;
mod timeout;

#[cfg(test)]
mod testing;

pub use config::{config, init_config, BotConfig, RuntimeEnv};
pub use custody_cache::CustodyCache;
pub use liquidator::{CycleSummary, Liquidator, PositionOutcome, SubmitOutcome};
pub use monitor::{
    bundled_program_id, resolve_program_id, run_healthcheck, watch_program_id,
    ProgramAddressSource, ProgramId, ProgramIdOrigin,
};
pub use position_store::PositionStore;
pub use scheduler::{Cadence, Scheduler};
