//! Solana interaction layer for the perpetuals liquidator.
//!
//! This crate provides:
//! - A sliding-window rate limiter and a rate-limited RPC transport
//! - Position and custody account decoding
//! - Program-derived address derivation
//! - Instruction builders for the liquidation view and the liquidation itself
//! - Signer loading
//! - The [`PerpetualsClient`] contract and its RPC implementation

mod accounts;
mod client;
mod error;
pub mod instructions;
mod pda;
mod rate_limiter;
mod signer;
mod transport;

pub use accounts::{
    Custody, OracleParams, OracleType, Position, CUSTODY_DISCRIMINATOR, POSITION_DISCRIMINATOR,
};
pub use client::{LiquidationState, PerpetualsClient, RpcPerpetualsClient};
pub use error::{ChainError, ChainResult, ACCOUNT_NOT_INITIALIZED};
pub use pda::ProgramAddresses;
pub use rate_limiter::{RateLimiter, DEVNET_MAX_REQUESTS, DEVNET_WINDOW};
pub use signer::keypair_from_json;
pub use transport::{rate_limited_client, RateLimitedSender};

// Re-exported so dependents name the same key and signature types.
pub use solana_sdk::pubkey::Pubkey;
pub use solana_sdk::signature::Signature;
