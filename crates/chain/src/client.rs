//! The perpetuals program as seen by the liquidator.
//!
//! [`PerpetualsClient`] is the whole external contract: list positions,
//! read a custody, ask the program whether a position can be liquidated,
//! and submit the liquidation. [`RpcPerpetualsClient`] implements it over a
//! (rate-limited) Solana RPC client.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use solana_account_decoder::UiAccountEncoding;
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcSimulateTransactionConfig,
};
use solana_rpc_client_api::filter::{Memcmp, RpcFilterType};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::InstructionError;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::{Transaction, TransactionError};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::accounts::{Custody, Position, POSITION_DISCRIMINATOR};
use crate::error::{ChainError, ChainResult, ACCOUNT_NOT_INITIALIZED};
use crate::instructions::{get_liquidation_state, liquidation_instructions};
use crate::pda::ProgramAddresses;

/// Raw answer of the program's liquidation view. Zero means healthy; any
/// other value means the program would accept a liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationState(pub u8);

impl LiquidationState {
    pub const HEALTHY: Self = Self(0);

    pub fn is_liquidatable(self) -> bool {
        self.0 != 0
    }
}

#[async_trait]
pub trait PerpetualsClient: Send + Sync {
    /// All open positions across all pools.
    async fn list_open_positions(&self) -> ChainResult<Vec<Position>>;

    async fn fetch_custody(&self, address: Pubkey) -> ChainResult<Custody>;

    /// Read-only liquidation check against current on-chain state.
    ///
    /// Returns [`ChainError::PositionClosed`] when the position account no
    /// longer exists.
    async fn evaluate_liquidation(
        &self,
        position: &Position,
        custody: &Custody,
    ) -> ChainResult<LiquidationState>;

    /// Submit the liquidation and return the transaction signature.
    async fn submit_liquidation(
        &self,
        position: &Position,
        custody: &Custody,
    ) -> ChainResult<Signature>;

    /// Key that signs liquidations and receives rewards.
    fn liquidator(&self) -> Pubkey;
}

pub struct RpcPerpetualsClient {
    rpc: Arc<RpcClient>,
    signer: Keypair,
    addresses: ProgramAddresses,
}

impl RpcPerpetualsClient {
    pub fn new(rpc: Arc<RpcClient>, signer: Keypair, program_id: Pubkey) -> Self {
        Self {
            rpc,
            signer,
            addresses: ProgramAddresses::new(program_id),
        }
    }
}

#[async_trait]
impl PerpetualsClient for RpcPerpetualsClient {
    #[instrument(skip(self), fields(program = %self.addresses.program_id))]
    async fn list_open_positions(&self) -> ChainResult<Vec<Position>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                0,
                POSITION_DISCRIMINATOR.to_vec(),
            ))]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(CommitmentConfig::confirmed()),
                ..Default::default()
            },
            ..Default::default()
        };

        let accounts = self
            .rpc
            .get_program_accounts_with_config(&self.addresses.program_id, config)
            .await?;

        let total = accounts.len();
        let positions: Vec<Position> = accounts
            .into_iter()
            .filter_map(|(address, account)| match Position::decode(address, &account.data) {
                Ok(position) => Some(position),
                Err(e) => {
                    warn!(position = %address, error = %e, "Skipping undecodable position account");
                    None
                }
            })
            .collect();

        debug!(total, decoded = positions.len(), "Fetched position accounts");
        Ok(positions)
    }

    async fn fetch_custody(&self, address: Pubkey) -> ChainResult<Custody> {
        let account = self
            .rpc
            .get_account_with_commitment(&address, CommitmentConfig::confirmed())
            .await?
            .value
            .ok_or(ChainError::AccountNotFound(address))?;
        Custody::decode(address, &account.data)
    }

    #[instrument(skip_all, fields(position = %position.address))]
    async fn evaluate_liquidation(
        &self,
        position: &Position,
        custody: &Custody,
    ) -> ChainResult<LiquidationState> {
        let ix = get_liquidation_state(&self.addresses, position, custody);
        let message = Message::new(&[ix], Some(&self.signer.pubkey()));
        let tx = Transaction::new_unsigned(message);

        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(CommitmentConfig::confirmed()),
            ..Default::default()
        };
        let result = self
            .rpc
            .simulate_transaction_with_config(&tx, config)
            .await?
            .value;

        if let Some(err) = result.err {
            if is_account_not_initialized(&err) {
                return Err(ChainError::PositionClosed(position.address));
            }
            return Err(ChainError::Simulation {
                err: err.to_string(),
                logs: result.logs.unwrap_or_default(),
            });
        }

        let encoded = result.return_data.map(|data| data.data.0);
        decode_return_state(encoded.as_deref())
            .map_err(|reason| ChainError::decode("return data", position.address, reason))
    }

    #[instrument(skip_all, fields(position = %position.address))]
    async fn submit_liquidation(
        &self,
        position: &Position,
        custody: &Custody,
    ) -> ChainResult<Signature> {
        let liquidator = self.signer.pubkey();
        let instructions =
            liquidation_instructions(&self.addresses, &liquidator, position, custody);

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let tx = Transaction::new_signed_with_payer(
            &instructions,
            Some(&liquidator),
            &[&self.signer],
            blockhash,
        );

        let signature = self.rpc.send_and_confirm_transaction(&tx).await?;
        Ok(signature)
    }

    fn liquidator(&self) -> Pubkey {
        self.signer.pubkey()
    }
}

fn is_account_not_initialized(err: &TransactionError) -> bool {
    matches!(
        err,
        TransactionError::InstructionError(_, InstructionError::Custom(code))
            if *code == ACCOUNT_NOT_INITIALIZED
    )
}

/// Decode the base64 return data of the liquidation view.
///
/// The runtime strips trailing zero bytes from return data, so a healthy
/// position (`0u8`) comes back as empty or missing data.
fn decode_return_state(encoded: Option<&str>) -> Result<LiquidationState, String> {
    let Some(encoded) = encoded else {
        return Ok(LiquidationState::HEALTHY);
    };
    let bytes = BASE64.decode(encoded).map_err(|e| e.to_string())?;
    Ok(LiquidationState(bytes.first().copied().unwrap_or(0)))
}
