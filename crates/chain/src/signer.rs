//! Signing identity of the liquidator.

use solana_sdk::signature::Keypair;

use crate::error::{ChainError, ChainResult};

/// Parse a keypair from its JSON byte-array form (`[12, 34, ...]`), the
/// format written by `solana-keygen`.
pub fn keypair_from_json(secret: &str) -> ChainResult<Keypair> {
    let bytes: Vec<u8> = serde_json::from_str(secret.trim())
        .map_err(|e| ChainError::InvalidKey(format!("expected a JSON byte array: {e}")))?;
    if bytes.len() != 64 {
        return Err(ChainError::InvalidKey(format!(
            "expected 64 bytes, got {}",
            bytes.len()
        )));
    }
    #[allow(deprecated)]
    Keypair::from_bytes(&bytes).map_err(|e| ChainError::InvalidKey(e.to_string()))
}
