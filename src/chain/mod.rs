//! Boundary to the blockchain.
//!
//! The contract key lives in the mint relay (the deployment tooling that
//! owns `completeTourAndMint`); this service only speaks HTTP/JSON to it.
//! The `Minter` trait is the seam the worker and tests depend on.

pub mod relay;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use relay::RelayMinter;

/// Result of a successful mint call.
///
/// Both fields empty means the contract reported the user as already
/// minted and no transaction was sent (idempotent no-op).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MintReceipt {
    pub token_id: String,
    pub tx_hash: String,
}

impl MintReceipt {
    pub fn is_noop(&self) -> bool {
        self.token_id.is_empty() && self.tx_hash.is_empty()
    }
}

/// On-chain state of a user as reported by the contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserChainStatus {
    pub completed_tour: bool,
    pub minted: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum MintError {
    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("mint relay error: {0}")]
    Relay(String),

    #[error("mint relay transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Chain-minting function the worker serializes calls to.
#[async_trait]
pub trait Minter: Send + Sync {
    /// Query the contract's view of the user.
    async fn user_status(&self, wallet: &str) -> Result<UserChainStatus, MintError>;

    /// Mint the completion NFT for `wallet`. Errors propagate to the caller;
    /// there is no retry or circuit breaker at this boundary.
    async fn mint(&self, wallet: &str) -> Result<MintReceipt, MintError>;
}

/// Minimal sanity check on an EVM address: 0x-prefixed, 40 hex chars.
pub fn validate_wallet(wallet: &str) -> Result<(), MintError> {
    let hex_part = wallet
        .strip_prefix("0x")
        .ok_or_else(|| MintError::InvalidAddress(wallet.to_string()))?;
    if hex_part.len() != 40 || hex::decode(hex_part).is_err() {
        return Err(MintError::InvalidAddress(wallet.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_wallet_accepts_checksummed() {
        assert!(validate_wallet("0x742d35Cc6634C0532925a3b8D6B3981d6F2F4a5a").is_ok());
    }

    #[test]
    fn test_validate_wallet_rejects_bad_input() {
        assert!(validate_wallet("742d35Cc6634C0532925a3b8D6B3981d6F2F4a5a").is_err());
        assert!(validate_wallet("0x1234").is_err());
        assert!(validate_wallet("0xZZZZ35Cc6634C0532925a3b8D6B3981d6F2F4a5a").is_err());
    }

    #[test]
    fn test_receipt_noop() {
        assert!(MintReceipt::default().is_noop());
        assert!(!MintReceipt {
            token_id: "7".into(),
            tx_hash: "0xabc".into()
        }
        .is_noop());
    }
}
