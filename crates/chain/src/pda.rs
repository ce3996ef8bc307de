//! Program-derived addresses of the perpetuals program.

use solana_sdk::pubkey::Pubkey;

pub const PERPETUALS_SEED: &[u8] = b"perpetuals";
pub const TRANSFER_AUTHORITY_SEED: &[u8] = b"transfer_authority";
pub const CUSTODY_TOKEN_ACCOUNT_SEED: &[u8] = b"custody_token_account";

/// Addresses derived from a program id, computed once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAddresses {
    pub program_id: Pubkey,
    /// Global program state
    pub perpetuals: Pubkey,
    /// Empty PDA that owns custody token accounts
    pub transfer_authority: Pubkey,
}

impl ProgramAddresses {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            perpetuals: find(&[PERPETUALS_SEED], &program_id),
            transfer_authority: find(&[TRANSFER_AUTHORITY_SEED], &program_id),
        }
    }

    /// Token account holding a custody's assets.
    pub fn custody_token_account(&self, pool: &Pubkey, mint: &Pubkey) -> Pubkey {
        find(
            &[CUSTODY_TOKEN_ACCOUNT_SEED, pool.as_ref(), mint.as_ref()],
            &self.program_id,
        )
    }
}

fn find(seeds: &[&[u8]], program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(seeds, program_id).0
}
