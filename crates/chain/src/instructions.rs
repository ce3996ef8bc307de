//! Instruction builders for the liquidator's two program calls.

use smallvec::SmallVec;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

use crate::accounts::{Custody, Position};
use crate::pda::ProgramAddresses;

pub const GET_LIQUIDATION_STATE_DISCRIMINATOR: [u8; 8] = [127, 126, 199, 117, 90, 89, 29, 50];
pub const LIQUIDATE_DISCRIMINATOR: [u8; 8] = [223, 179, 226, 125, 48, 46, 39, 74];

/// Both instructions take an empty params struct, so the data is just the
/// discriminator.
fn data(discriminator: [u8; 8]) -> Vec<u8> {
    discriminator.to_vec()
}

/// Read-only view returning 0 when the position is healthy.
pub fn get_liquidation_state(
    addresses: &ProgramAddresses,
    position: &Position,
    custody: &Custody,
) -> Instruction {
    Instruction {
        program_id: addresses.program_id,
        accounts: vec![
            AccountMeta::new_readonly(addresses.perpetuals, false),
            AccountMeta::new_readonly(position.pool, false),
            AccountMeta::new_readonly(position.address, false),
            AccountMeta::new_readonly(position.custody, false),
            AccountMeta::new_readonly(custody.oracle.oracle_account, false),
        ],
        data: data(GET_LIQUIDATION_STATE_DISCRIMINATOR),
    }
}

/// Token accounts a liquidation pays out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivingAccounts {
    /// Position owner's account, receives the remaining collateral
    pub owner: Pubkey,
    /// Liquidator's account, receives the reward
    pub rewards: Pubkey,
}

impl ReceivingAccounts {
    pub fn derive(liquidator: &Pubkey, position: &Position, custody: &Custody) -> Self {
        Self {
            owner: get_associated_token_address(&position.owner, &custody.mint),
            rewards: get_associated_token_address(liquidator, &custody.mint),
        }
    }
}

/// Full instruction set for liquidating one position.
///
/// Both receiving token accounts are created with the idempotent variant,
/// so the set stays valid when they already exist.
pub fn liquidation_instructions(
    addresses: &ProgramAddresses,
    liquidator: &Pubkey,
    position: &Position,
    custody: &Custody,
) -> SmallVec<[Instruction; 3]> {
    let receiving = ReceivingAccounts::derive(liquidator, position, custody);

    let mut instructions = SmallVec::new();
    instructions.push(create_associated_token_account_idempotent(
        liquidator,
        &position.owner,
        &custody.mint,
        &spl_token::id(),
    ));
    instructions.push(create_associated_token_account_idempotent(
        liquidator,
        liquidator,
        &custody.mint,
        &spl_token::id(),
    ));
    instructions.push(liquidate(addresses, liquidator, &receiving, position, custody));
    instructions
}

pub fn liquidate(
    addresses: &ProgramAddresses,
    liquidator: &Pubkey,
    receiving: &ReceivingAccounts,
    position: &Position,
    custody: &Custody,
) -> Instruction {
    Instruction {
        program_id: addresses.program_id,
        accounts: vec![
            AccountMeta::new(*liquidator, true),
            AccountMeta::new(receiving.owner, false),
            AccountMeta::new(receiving.rewards, false),
            AccountMeta::new_readonly(addresses.transfer_authority, false),
            AccountMeta::new_readonly(addresses.perpetuals, false),
            AccountMeta::new(position.pool, false),
            AccountMeta::new(position.address, false),
            AccountMeta::new(position.custody, false),
            AccountMeta::new_readonly(custody.oracle.oracle_account, false),
            AccountMeta::new(
                addresses.custody_token_account(&position.pool, &custody.mint),
                false,
            ),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: data(LIQUIDATE_DISCRIMINATOR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{OracleParams, OracleType};

    fn sample() -> (ProgramAddresses, Pubkey, Position, Custody) {
        let addresses = ProgramAddresses::new(Pubkey::new_unique());
        let pool = Pubkey::new_unique();
        let custody = Custody {
            address: Pubkey::new_unique(),
            pool,
            mint: Pubkey::new_unique(),
            token_account: Pubkey::new_unique(),
            decimals: 6,
            oracle: OracleParams {
                oracle_account: Pubkey::new_unique(),
                oracle_type: OracleType::Custom,
                oracle_authority: Pubkey::new_unique(),
                max_price_error: 100,
                max_price_age_sec: 30,
            },
        };
        let position = Position {
            address: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
            pool,
            custody: custody.address,
            open_time: 0,
            update_time: 0,
            price: 1,
            size_usd: 1,
            borrow_size_usd: 0,
            collateral_usd: 1,
            unrealized_profit_usd: 0,
            unrealized_loss_usd: 0,
            cumulative_interest_snapshot: 0,
            locked_amount: 0,
            collateral_amount: 1,
            bump: 255,
        };
        (addresses, Pubkey::new_unique(), position, custody)
    }

    #[test]
    fn test_liquidation_set_creates_accounts_idempotently() {
        let (addresses, liquidator, position, custody) = sample();
        let instructions = liquidation_instructions(&addresses, &liquidator, &position, &custody);

        assert_eq!(instructions.len(), 3);
        for create in &instructions[..2] {
            assert_eq!(create.program_id, spl_associated_token_account::id());
            // 1 = CreateIdempotent; 0 would fail when the account exists.
            assert_eq!(create.data, vec![1]);
            assert_eq!(create.accounts[0].pubkey, liquidator);
            assert!(create.accounts[0].is_signer);
        }

        let receiving = ReceivingAccounts::derive(&liquidator, &position, &custody);
        assert_eq!(instructions[0].accounts[1].pubkey, receiving.owner);
        assert_eq!(instructions[1].accounts[1].pubkey, receiving.rewards);
        assert_eq!(instructions[2].program_id, addresses.program_id);
    }

    #[test]
    fn test_liquidation_set_is_stable_across_submissions() {
        // A second submission for the same, now existing, accounts must
        // produce the exact same idempotent set.
        let (addresses, liquidator, position, custody) = sample();
        let first = liquidation_instructions(&addresses, &liquidator, &position, &custody);
        let second = liquidation_instructions(&addresses, &liquidator, &position, &custody);
        assert_eq!(first, second);
    }

    #[test]
    fn test_liquidate_account_order() {
        let (addresses, liquidator, position, custody) = sample();
        let receiving = ReceivingAccounts::derive(&liquidator, &position, &custody);
        let ix = liquidate(&addresses, &liquidator, &receiving, &position, &custody);

        let keys: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        assert_eq!(
            keys,
            vec![
                liquidator,
                receiving.owner,
                receiving.rewards,
                addresses.transfer_authority,
                addresses.perpetuals,
                position.pool,
                position.address,
                position.custody,
                custody.oracle.oracle_account,
                addresses.custody_token_account(&position.pool, &custody.mint),
                spl_token::id(),
            ]
        );
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(!ix.accounts[3].is_writable);
        assert_eq!(ix.data, LIQUIDATE_DISCRIMINATOR.to_vec());
    }

    #[test]
    fn test_get_liquidation_state_is_read_only() {
        let (addresses, _, position, custody) = sample();
        let ix = get_liquidation_state(&addresses, &position, &custody);
        assert_eq!(ix.accounts.len(), 5);
        assert!(ix.accounts.iter().all(|m| !m.is_writable && !m.is_signer));
        assert_eq!(ix.accounts[4].pubkey, custody.oracle.oracle_account);
        assert_eq!(ix.data, GET_LIQUIDATION_STATE_DISCRIMINATOR.to_vec());
    }
}
