//! Mint queue and worker.
//!
//! All chain-minting calls are funneled through one unbounded FIFO channel
//! drained by a single consumer task, so at most one mint is in flight at a
//! time. A voucher id may be queued more than once (sweep races, operator
//! retries); the status compare-and-set on claim makes reprocessing a no-op.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chain::Minter;
use crate::models::metadata::NftMetadata;
use crate::models::voucher::VoucherStatus;
use crate::store::MintStore;

/// Handle for enqueuing vouchers and inspecting the worker.
#[derive(Clone)]
pub struct MintQueue {
    tx: mpsc::UnboundedSender<Uuid>,
    depth: Arc<AtomicUsize>,
    stats: Arc<WorkerStats>,
}

#[derive(Default)]
pub struct WorkerStats {
    pub minted: AtomicU64,
    pub failed: AtomicU64,
    pub skipped: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub depth: usize,
    pub minted: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl MintQueue {
    /// Create the queue and its receiving end. The caller passes the receiver
    /// to [`spawn_worker`]; keeping construction separate lets tests drain the
    /// channel themselves.
    pub fn new() -> (Self, MintQueueReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        let stats = Arc::new(WorkerStats::default());
        (
            Self {
                tx,
                depth: depth.clone(),
                stats: stats.clone(),
            },
            MintQueueReceiver { rx, depth, stats },
        )
    }

    /// Push a voucher id onto the tail of the queue.
    pub fn enqueue(&self, voucher_id: Uuid) {
        if self.tx.send(voucher_id).is_err() {
            // Only possible when the worker task is gone; nothing to do but log.
            error!(%voucher_id, "mint queue receiver dropped, voucher not enqueued");
            return;
        }
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(%voucher_id, depth, "voucher enqueued for minting");
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            depth: self.depth.load(Ordering::Relaxed),
            minted: self.stats.minted.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
        }
    }
}

pub struct MintQueueReceiver {
    rx: mpsc::UnboundedReceiver<Uuid>,
    depth: Arc<AtomicUsize>,
    stats: Arc<WorkerStats>,
}

/// Spawn the single consumer task. Call this once at startup.
pub fn spawn_worker(
    store: Arc<dyn MintStore>,
    minter: Arc<dyn Minter>,
    public_base_url: String,
    mut receiver: MintQueueReceiver,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("mint worker started");
        while let Some(voucher_id) = receiver.rx.recv().await {
            receiver.depth.fetch_sub(1, Ordering::Relaxed);
            match process_mint_task(store.as_ref(), minter.as_ref(), &public_base_url, voucher_id)
                .await
            {
                Ok(Outcome::Minted) => {
                    receiver.stats.minted.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Outcome::Skipped) => {
                    receiver.stats.skipped.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    receiver.stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!(%voucher_id, error = %e, "mint task failed, voucher marked failed");
                    if let Err(e) = store.mark_voucher_failed(voucher_id).await {
                        error!(%voucher_id, error = %e, "could not mark voucher failed");
                    }
                }
            }
        }
        info!("mint worker stopped: queue sender dropped");
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Minted,
    Skipped,
}

/// Process one voucher to completion. Errors bubble to the worker loop which
/// marks the voucher failed; skips (missing or already-advanced vouchers) are
/// not errors.
async fn process_mint_task(
    store: &dyn MintStore,
    minter: &dyn Minter,
    public_base_url: &str,
    voucher_id: Uuid,
) -> anyhow::Result<Outcome> {
    info!(%voucher_id, "processing mint task");

    let Some(voucher) = store.get_voucher(voucher_id).await? else {
        warn!(%voucher_id, "voucher not found, dropping task");
        return Ok(Outcome::Skipped);
    };

    if voucher.status != VoucherStatus::Pending {
        warn!(%voucher_id, status = ?voucher.status, "voucher is not pending, skipping");
        return Ok(Outcome::Skipped);
    }

    // CAS guard against a concurrent operator action between fetch and claim.
    if !store.claim_voucher_for_minting(voucher_id).await? {
        warn!(%voucher_id, "voucher claimed elsewhere, skipping");
        return Ok(Outcome::Skipped);
    }

    let user = store
        .get_user(voucher.user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("voucher {} references missing user", voucher_id))?;
    let route = store
        .get_route(&voucher.route_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("voucher {} references missing route", voucher_id))?;
    let poi_count = store.count_pois(&voucher.route_id).await?;

    let receipt = minter
        .mint(&user.wallet_address)
        .await
        .map_err(|e| anyhow::anyhow!("mint call failed: {}", e))?;

    let metadata = NftMetadata::for_completion(
        public_base_url,
        voucher_id,
        &route.name,
        poi_count,
        &user.wallet_address,
        chrono::Utc::now(),
    );
    let metadata_json = serde_json::to_value(&metadata)?;

    let token_id = (!receipt.token_id.is_empty()).then_some(receipt.token_id.as_str());
    let tx_hash = (!receipt.tx_hash.is_empty()).then_some(receipt.tx_hash.as_str());
    store
        .complete_voucher_minted(voucher_id, token_id, tx_hash, &metadata_json)
        .await?;

    info!(
        %voucher_id,
        user_id = %voucher.user_id,
        route_id = %voucher.route_id,
        token_id = %receipt.token_id,
        "NFT minted"
    );
    Ok(Outcome::Minted)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::chain::{MintError, MintReceipt, UserChainStatus};
    use crate::models::route::RouteRow;
    use crate::models::voucher::VoucherRow;
    use crate::store::postgres::UserRow;

    // ── In-memory store / minter fakes ───────────────────────

    #[derive(Default)]
    struct FakeStore {
        vouchers: Mutex<HashMap<Uuid, VoucherRow>>,
        users: Mutex<HashMap<Uuid, UserRow>>,
        routes: Mutex<HashMap<String, RouteRow>>,
        pois_per_route: i64,
        claims: AtomicUsize,
    }

    impl FakeStore {
        fn with_voucher(
            self,
            id: Uuid,
            user_id: Uuid,
            route_id: &str,
            status: VoucherStatus,
            token_id: Option<&str>,
        ) -> Self {
            self.vouchers.lock().unwrap().insert(
                id,
                VoucherRow {
                    id,
                    user_id,
                    route_id: route_id.to_string(),
                    status,
                    nft_token_id: token_id.map(String::from),
                    mint_tx_hash: token_id.map(|_| "0xdead".to_string()),
                    metadata: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
            );
            self
        }

        fn with_user(self, id: Uuid, wallet: &str) -> Self {
            self.users.lock().unwrap().insert(
                id,
                UserRow {
                    id,
                    wallet_address: wallet.to_string(),
                    nickname: None,
                    created_at: Utc::now(),
                },
            );
            self
        }

        fn with_route(self, route_id: &str, name: &str) -> Self {
            self.routes.lock().unwrap().insert(
                route_id.to_string(),
                RouteRow {
                    id: route_id.to_string(),
                    name: name.to_string(),
                    description: None,
                    estimated_minutes: 30,
                    created_at: Utc::now(),
                },
            );
            self
        }

        fn voucher_status(&self, id: Uuid) -> VoucherStatus {
            self.vouchers.lock().unwrap()[&id].status
        }
    }

    #[async_trait]
    impl MintStore for FakeStore {
        async fn get_voucher(&self, id: Uuid) -> anyhow::Result<Option<VoucherRow>> {
            Ok(self.vouchers.lock().unwrap().get(&id).map(|v| VoucherRow {
                id: v.id,
                user_id: v.user_id,
                route_id: v.route_id.clone(),
                status: v.status,
                nft_token_id: v.nft_token_id.clone(),
                mint_tx_hash: v.mint_tx_hash.clone(),
                metadata: v.metadata.clone(),
                created_at: v.created_at,
                updated_at: v.updated_at,
            }))
        }

        async fn claim_voucher_for_minting(&self, id: Uuid) -> anyhow::Result<bool> {
            self.claims.fetch_add(1, Ordering::Relaxed);
            let mut vouchers = self.vouchers.lock().unwrap();
            match vouchers.get_mut(&id) {
                Some(v) if v.status == VoucherStatus::Pending => {
                    v.status = VoucherStatus::Minting;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn get_user(&self, id: Uuid) -> anyhow::Result<Option<UserRow>> {
            Ok(self.users.lock().unwrap().get(&id).map(|u| UserRow {
                id: u.id,
                wallet_address: u.wallet_address.clone(),
                nickname: u.nickname.clone(),
                created_at: u.created_at,
            }))
        }

        async fn get_route(&self, route_id: &str) -> anyhow::Result<Option<RouteRow>> {
            Ok(self.routes.lock().unwrap().get(route_id).map(|r| RouteRow {
                id: r.id.clone(),
                name: r.name.clone(),
                description: r.description.clone(),
                estimated_minutes: r.estimated_minutes,
                created_at: r.created_at,
            }))
        }

        async fn count_pois(&self, _route_id: &str) -> anyhow::Result<i64> {
            Ok(self.pois_per_route)
        }

        async fn complete_voucher_minted(
            &self,
            id: Uuid,
            nft_token_id: Option<&str>,
            mint_tx_hash: Option<&str>,
            metadata: &serde_json::Value,
        ) -> anyhow::Result<()> {
            let mut vouchers = self.vouchers.lock().unwrap();
            let v = vouchers.get_mut(&id).unwrap();
            v.status = VoucherStatus::Minted;
            v.nft_token_id = nft_token_id.map(String::from);
            v.mint_tx_hash = mint_tx_hash.map(String::from);
            v.metadata = Some(metadata.clone());
            Ok(())
        }

        async fn mark_voucher_failed(&self, id: Uuid) -> anyhow::Result<()> {
            let mut vouchers = self.vouchers.lock().unwrap();
            let v = vouchers.get_mut(&id).unwrap();
            v.status = VoucherStatus::Failed;
            Ok(())
        }
    }

    /// Succeeds with a fixed receipt except for wallets listed as failing.
    #[derive(Default)]
    struct FakeMinter {
        fail_wallets: Vec<String>,
    }

    #[async_trait]
    impl Minter for FakeMinter {
        async fn user_status(&self, _wallet: &str) -> Result<UserChainStatus, MintError> {
            Ok(UserChainStatus::default())
        }

        async fn mint(&self, wallet: &str) -> Result<MintReceipt, MintError> {
            if self.fail_wallets.iter().any(|w| w == wallet) {
                return Err(MintError::Relay("insufficient gas".into()));
            }
            Ok(MintReceipt {
                token_id: "7".into(),
                tx_hash: "0xabc".into(),
            })
        }
    }

    // ── Queue accounting ─────────────────────────────────────

    #[tokio::test]
    async fn test_enqueue_preserves_fifo_order() {
        let (queue, mut receiver) = MintQueue::new();
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            queue.enqueue(*id);
        }
        assert_eq!(queue.status().depth, 5);

        for expected in &ids {
            let got = receiver.rx.recv().await.unwrap();
            assert_eq!(got, *expected);
        }
    }

    #[tokio::test]
    async fn test_depth_tracks_enqueues() {
        let (queue, _receiver) = MintQueue::new();
        assert_eq!(queue.status().depth, 0);
        queue.enqueue(Uuid::new_v4());
        queue.enqueue(Uuid::new_v4());
        assert_eq!(queue.status().depth, 2);
    }

    #[test]
    fn test_status_serializes_counters() {
        let (queue, _receiver) = MintQueue::new();
        let json = serde_json::to_value(queue.status()).unwrap();
        assert_eq!(json["depth"], 0);
        assert_eq!(json["minted"], 0);
        assert_eq!(json["failed"], 0);
        assert_eq!(json["skipped"], 0);
    }

    // ── Worker semantics ─────────────────────────────────────

    #[tokio::test]
    async fn test_requeued_minted_voucher_is_skipped_without_mutation() {
        let voucher_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let store = FakeStore::default()
            .with_voucher(voucher_id, user_id, "route_1", VoucherStatus::Minted, Some("3"))
            .with_user(user_id, "0x742d35Cc6634C0532925a3b8D6B3981d6F2F4a5a")
            .with_route("route_1", "中轴线经典游");
        let minter = FakeMinter::default();

        let outcome = process_mint_task(&store, &minter, "http://localhost:8090", voucher_id)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        // Skip happens before the claim; the stored row must be untouched.
        assert_eq!(store.claims.load(Ordering::Relaxed), 0);
        let vouchers = store.vouchers.lock().unwrap();
        let v = &vouchers[&voucher_id];
        assert_eq!(v.status, VoucherStatus::Minted);
        assert_eq!(v.nft_token_id.as_deref(), Some("3"));
        assert_eq!(v.mint_tx_hash.as_deref(), Some("0xdead"));
    }

    #[tokio::test]
    async fn test_missing_voucher_is_skipped() {
        let store = FakeStore::default();
        let minter = FakeMinter::default();
        let outcome = process_mint_task(&store, &minter, "http://localhost:8090", Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);
    }

    #[tokio::test]
    async fn test_mint_error_marks_failed_and_worker_continues() {
        let failing_id = Uuid::new_v4();
        let ok_id = Uuid::new_v4();
        let failing_user = Uuid::new_v4();
        let ok_user = Uuid::new_v4();

        let mut store = FakeStore::default()
            .with_voucher(failing_id, failing_user, "route_1", VoucherStatus::Pending, None)
            .with_voucher(ok_id, ok_user, "route_1", VoucherStatus::Pending, None)
            .with_user(failing_user, "0x1111111111111111111111111111111111111111")
            .with_user(ok_user, "0x2222222222222222222222222222222222222222")
            .with_route("route_1", "中轴线经典游");
        store.pois_per_route = 3;
        let store = Arc::new(store);

        let minter = Arc::new(FakeMinter {
            fail_wallets: vec!["0x1111111111111111111111111111111111111111".into()],
        });

        let (queue, receiver) = MintQueue::new();
        spawn_worker(
            store.clone(),
            minter,
            "http://localhost:8090".into(),
            receiver,
        );
        queue.enqueue(failing_id);
        queue.enqueue(ok_id);

        // The second task can only complete if the failure did not kill the loop.
        for _ in 0..100 {
            let s = queue.status();
            if s.minted == 1 && s.failed == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let status = queue.status();
        assert_eq!(status.failed, 1);
        assert_eq!(status.minted, 1);
        assert_eq!(status.depth, 0);

        assert_eq!(store.voucher_status(failing_id), VoucherStatus::Failed);
        {
            let vouchers = store.vouchers.lock().unwrap();
            let failed = &vouchers[&failing_id];
            assert!(failed.nft_token_id.is_none());
            assert!(failed.mint_tx_hash.is_none());
        }

        assert_eq!(store.voucher_status(ok_id), VoucherStatus::Minted);
        let vouchers = store.vouchers.lock().unwrap();
        let minted = &vouchers[&ok_id];
        assert_eq!(minted.nft_token_id.as_deref(), Some("7"));
        assert_eq!(minted.mint_tx_hash.as_deref(), Some("0xabc"));
        assert!(minted.metadata.is_some());
    }
}
