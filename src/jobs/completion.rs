//! Route-completion detection.
//!
//! Two entry points share one dedup authority (the unique constraint on
//! `vouchers (user_id, route_id)`):
//!
//! - [`evaluate`] is called directly from the check-in write path, so a
//!   completing check-in enqueues its mint without waiting for a poll.
//! - [`spawn_sweep`] re-scans approved check-ins on a fixed interval as a
//!   catch-up path for rows approved out-of-band and for process restarts.

use std::time::Duration;

use dashmap::DashSet;
use tokio::time;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::mint_worker::MintQueue;
use crate::store::postgres::PgStore;

/// Result of evaluating one (user, route) pair.
#[derive(Debug, PartialEq, Eq)]
pub enum Evaluation {
    /// Fewer approved check-ins than POIs (or the route has no POIs).
    Incomplete,
    /// Route complete, voucher created by this call and enqueued.
    Vouchered(Uuid),
    /// Route complete but a voucher already exists; nothing enqueued.
    AlreadyVouchered,
}

/// Compare approved check-ins against the route's POI count and, on
/// completion, create-and-enqueue the voucher at most once.
pub async fn evaluate(
    store: &PgStore,
    queue: &MintQueue,
    user_id: Uuid,
    route_id: &str,
) -> anyhow::Result<Evaluation> {
    let completed = store.count_approved_checkins(user_id, route_id).await?;
    let total = store.count_pois(route_id).await?;

    if total == 0 || completed < total {
        debug!(%user_id, route_id, completed, total, "route not yet complete");
        return Ok(Evaluation::Incomplete);
    }

    match store.create_voucher_if_absent(user_id, route_id).await? {
        Some(voucher_id) => {
            info!(%user_id, route_id, %voucher_id, "route completed, voucher created");
            queue.enqueue(voucher_id);
            Ok(Evaluation::Vouchered(voucher_id))
        }
        None => {
            debug!(%user_id, route_id, "route complete but voucher already exists");
            Ok(Evaluation::AlreadyVouchered)
        }
    }
}

/// Spawn the periodic completion sweep. Call this once at startup.
///
/// The `DashSet` is only a skip-cache over pairs this process already found
/// complete; correctness does not depend on it.
pub fn spawn_sweep(
    store: PgStore,
    queue: MintQueue,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs, "completion sweep started");
        let processed: DashSet<String> = DashSet::new();
        let mut interval = time::interval(Duration::from_secs(interval_secs));
        loop {
            // First tick fires immediately, so startup state is swept at once.
            interval.tick().await;
            if let Err(e) = sweep_once(&store, &queue, &processed).await {
                error!(error = %e, "completion sweep failed");
            }
        }
    })
}

async fn sweep_once(
    store: &PgStore,
    queue: &MintQueue,
    processed: &DashSet<String>,
) -> anyhow::Result<()> {
    let candidates = store.list_completion_candidates().await?;
    debug!(count = candidates.len(), "sweeping completion candidates");

    for candidate in candidates {
        let key = candidate.key();
        if processed.contains(&key) {
            continue;
        }

        // Per-pair failures must not abort the sweep or starve other pairs.
        match evaluate(store, queue, candidate.user_id, &candidate.route_id).await {
            Ok(Evaluation::Incomplete) => {}
            Ok(Evaluation::Vouchered(_)) | Ok(Evaluation::AlreadyVouchered) => {
                processed.insert(key);
            }
            Err(e) => {
                error!(
                    user_id = %candidate.user_id,
                    route_id = %candidate.route_id,
                    error = %e,
                    "completion evaluation failed for pair"
                );
            }
        }
    }

    Ok(())
}

/// Re-enqueue vouchers left unfinished by a previous process. Run before the
/// server starts accepting traffic.
pub async fn recover_unfinished(store: &PgStore, queue: &MintQueue) -> anyhow::Result<usize> {
    let released = store.release_stuck_minting().await?;
    if released > 0 {
        info!(released, "released vouchers stuck in minting");
    }

    let ids = store.list_unfinished_voucher_ids().await?;
    for id in &ids {
        queue.enqueue(*id);
    }
    if !ids.is_empty() {
        info!(count = ids.len(), "re-enqueued unfinished vouchers");
    }
    Ok(ids.len())
}
