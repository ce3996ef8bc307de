//! Error type for cluster interaction.

use solana_rpc_client_api::client_error::Error as ClientError;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use thiserror::Error;

/// Anchor's `AccountNotInitialized` error code.
pub const ACCOUNT_NOT_INITIALIZED: u32 = 3012;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc request failed: {0}")]
    Rpc(#[from] Box<ClientError>),

    #[error("failed to decode {kind} account {address}: {reason}")]
    Decode {
        kind: &'static str,
        address: Pubkey,
        reason: String,
    },

    #[error("account {0} not found")]
    AccountNotFound(Pubkey),

    /// The position account no longer exists on-chain.
    #[error("position {0} is closed")]
    PositionClosed(Pubkey),

    #[error("simulation failed: {err}")]
    Simulation { err: String, logs: Vec<String> },

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

impl From<ClientError> for ChainError {
    fn from(err: ClientError) -> Self {
        Self::Rpc(Box::new(err))
    }
}

impl ChainError {
    pub fn decode(kind: &'static str, address: Pubkey, reason: impl ToString) -> Self {
        Self::Decode {
            kind,
            address,
            reason: reason.to_string(),
        }
    }

    /// Whether retrying next cycle could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::Timeout(_))
    }
}

pub type ChainResult<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;
    use solana_rpc_client_api::client_error::ErrorKind;

    #[test]
    fn test_transient_errors() {
        let rpc: ChainError = ClientError::from(ErrorKind::Custom("connection reset".into())).into();
        assert!(rpc.is_transient());
        assert!(ChainError::Timeout(Duration::from_secs(30)).is_transient());

        let address = Pubkey::new_unique();
        assert!(!ChainError::PositionClosed(address).is_transient());
        assert!(!ChainError::AccountNotFound(address).is_transient());
        assert!(!ChainError::decode("custody", address, "truncated").is_transient());
        assert!(!ChainError::Simulation {
            err: "custom program error".to_string(),
            logs: Vec::new(),
        }
        .is_transient());
    }
}
