//! Perpetuals program account layouts.
//!
//! Only the parts of each account the liquidator reads are decoded. Both
//! layouts are Anchor accounts: an 8-byte discriminator followed by the
//! borsh-encoded struct.

use borsh::BorshDeserialize;
use chrono::{DateTime, Utc};
use solana_sdk::pubkey::Pubkey;

use crate::error::{ChainError, ChainResult};

pub const DISCRIMINATOR_LEN: usize = 8;
pub const POSITION_DISCRIMINATOR: [u8; 8] = [170, 188, 143, 228, 122, 64, 247, 208];
pub const CUSTODY_DISCRIMINATOR: [u8; 8] = [1, 184, 48, 81, 93, 131, 63, 145];

/// Oracle backing a custody's price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshDeserialize)]
pub enum OracleType {
    None,
    Custom,
    Pyth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleParams {
    /// Account the program reads the price from
    pub oracle_account: Pubkey,
    pub oracle_type: OracleType,
    /// Signer allowed to push permissionless off-chain price updates
    pub oracle_authority: Pubkey,
    pub max_price_error: u64,
    pub max_price_age_sec: u32,
}

/// Open leveraged position, as last read from the cluster.
///
/// This is a snapshot; the program is the only source of truth for
/// whether it can be liquidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub address: Pubkey,
    pub owner: Pubkey,
    pub pool: Pubkey,
    pub custody: Pubkey,
    pub open_time: i64,
    pub update_time: i64,
    /// Entry price
    pub price: u64,
    pub size_usd: u64,
    pub borrow_size_usd: u64,
    pub collateral_usd: u64,
    pub unrealized_profit_usd: u64,
    pub unrealized_loss_usd: u64,
    pub cumulative_interest_snapshot: u128,
    pub locked_amount: u64,
    pub collateral_amount: u64,
    pub bump: u8,
}

impl Position {
    /// Decode a position account's raw data.
    pub fn decode(address: Pubkey, data: &[u8]) -> ChainResult<Self> {
        let mut body = strip_discriminator("position", address, data, &POSITION_DISCRIMINATOR)?;
        let raw = RawPosition::deserialize(&mut body)
            .map_err(|e| ChainError::decode("position", address, e))?;

        Ok(Self {
            address,
            owner: Pubkey::new_from_array(raw.owner),
            pool: Pubkey::new_from_array(raw.pool),
            custody: Pubkey::new_from_array(raw.custody),
            open_time: raw.open_time,
            update_time: raw.update_time,
            price: raw.price,
            size_usd: raw.size_usd,
            borrow_size_usd: raw.borrow_size_usd,
            collateral_usd: raw.collateral_usd,
            unrealized_profit_usd: raw.unrealized_profit_usd,
            unrealized_loss_usd: raw.unrealized_loss_usd,
            cumulative_interest_snapshot: raw.cumulative_interest_snapshot,
            locked_amount: raw.locked_amount,
            collateral_amount: raw.collateral_amount,
            bump: raw.bump,
        })
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.open_time, 0)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.update_time, 0)
    }
}

/// Per-asset vault configuration. Only the leading fields are decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Custody {
    pub address: Pubkey,
    pub pool: Pubkey,
    pub mint: Pubkey,
    pub token_account: Pubkey,
    pub decimals: u8,
    pub oracle: OracleParams,
}

impl Custody {
    pub fn decode(address: Pubkey, data: &[u8]) -> ChainResult<Self> {
        let mut body = strip_discriminator("custody", address, data, &CUSTODY_DISCRIMINATOR)?;
        // The rest of the account (pricing, fees, stats) is left unread.
        let raw = RawCustodyHead::deserialize(&mut body)
            .map_err(|e| ChainError::decode("custody", address, e))?;

        Ok(Self {
            address,
            pool: Pubkey::new_from_array(raw.pool),
            mint: Pubkey::new_from_array(raw.mint),
            token_account: Pubkey::new_from_array(raw.token_account),
            decimals: raw.decimals,
            oracle: OracleParams {
                oracle_account: Pubkey::new_from_array(raw.oracle.oracle_account),
                oracle_type: raw.oracle.oracle_type,
                oracle_authority: Pubkey::new_from_array(raw.oracle.oracle_authority),
                max_price_error: raw.oracle.max_price_error,
                max_price_age_sec: raw.oracle.max_price_age_sec,
            },
        })
    }
}

fn strip_discriminator<'a>(
    kind: &'static str,
    address: Pubkey,
    data: &'a [u8],
    expected: &[u8; DISCRIMINATOR_LEN],
) -> ChainResult<&'a [u8]> {
    if data.len() < DISCRIMINATOR_LEN {
        return Err(ChainError::decode(kind, address, format!("{} bytes is too short", data.len())));
    }
    let (discriminator, body) = data.split_at(DISCRIMINATOR_LEN);
    if discriminator != expected {
        return Err(ChainError::decode(kind, address, "discriminator mismatch"));
    }
    Ok(body)
}

#[derive(BorshDeserialize)]
struct RawPosition {
    owner: [u8; 32],
    pool: [u8; 32],
    custody: [u8; 32],
    open_time: i64,
    update_time: i64,
    price: u64,
    size_usd: u64,
    borrow_size_usd: u64,
    collateral_usd: u64,
    unrealized_profit_usd: u64,
    unrealized_loss_usd: u64,
    cumulative_interest_snapshot: u128,
    locked_amount: u64,
    collateral_amount: u64,
    bump: u8,
}

#[derive(BorshDeserialize)]
struct RawOracleParams {
    oracle_account: [u8; 32],
    oracle_type: OracleType,
    oracle_authority: [u8; 32],
    max_price_error: u64,
    max_price_age_sec: u32,
}

#[derive(BorshDeserialize)]
struct RawCustodyHead {
    pool: [u8; 32],
    mint: [u8; 32],
    token_account: [u8; 32],
    decimals: u8,
    oracle: RawOracleParams,
}
