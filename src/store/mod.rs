use async_trait::async_trait;
use uuid::Uuid;

use crate::models::route::RouteRow;
use crate::models::voucher::VoucherRow;

pub mod postgres;

/// Store surface the mint worker drives: voucher claim/completion plus the
/// lookups needed to build metadata. `PgStore` is the production
/// implementation; worker tests substitute an in-memory one, the same seam
/// pattern the `Minter` trait provides for the chain boundary.
#[async_trait]
pub trait MintStore: Send + Sync {
    async fn get_voucher(&self, id: Uuid) -> anyhow::Result<Option<VoucherRow>>;

    /// Compare-and-set `pending → minting`; `false` means the voucher was
    /// already claimed or advanced elsewhere.
    async fn claim_voucher_for_minting(&self, id: Uuid) -> anyhow::Result<bool>;

    async fn get_user(&self, id: Uuid) -> anyhow::Result<Option<postgres::UserRow>>;

    async fn get_route(&self, route_id: &str) -> anyhow::Result<Option<RouteRow>>;

    async fn count_pois(&self, route_id: &str) -> anyhow::Result<i64>;

    async fn complete_voucher_minted(
        &self,
        id: Uuid,
        nft_token_id: Option<&str>,
        mint_tx_hash: Option<&str>,
        metadata: &serde_json::Value,
    ) -> anyhow::Result<()>;

    async fn mark_voucher_failed(&self, id: Uuid) -> anyhow::Result<()>;
}
