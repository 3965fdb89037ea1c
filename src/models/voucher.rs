use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an NFT issuance voucher.
///
/// Transitions only move forward: `pending → minting → minted` or
/// `pending → minting → failed`. A `failed` voucher can be reset to
/// `pending` by an operator retry, never by the worker itself.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum VoucherStatus {
    Pending,
    Minting,
    Minted,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoucherRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub route_id: String,
    pub status: VoucherStatus,
    pub nft_token_id: Option<String>,
    pub mint_tx_hash: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&VoucherStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&VoucherStatus::Minted).unwrap(),
            "\"minted\""
        );
    }

    #[test]
    fn test_status_roundtrip() {
        let s: VoucherStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(s, VoucherStatus::Failed);
    }
}
