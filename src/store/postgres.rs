use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::checkin::{CheckinRow, CheckinStatus, CompletionCandidate, NewCheckin};
use crate::models::route::{PoiRow, RouteRow};
use crate::models::voucher::VoucherRow;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Round-trip to the database; readiness probes call this.
    pub async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    // -- User Operations --

    pub async fn get_user_by_wallet(&self, wallet: &str) -> anyhow::Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, wallet_address, nickname, created_at FROM users WHERE wallet_address = $1",
        )
        .bind(wallet)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_user(&self, id: Uuid) -> anyhow::Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, wallet_address, nickname, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert_user(&self, wallet: &str, nickname: Option<&str>) -> anyhow::Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"INSERT INTO users (wallet_address, nickname) VALUES ($1, $2)
               ON CONFLICT (wallet_address) DO UPDATE SET updated_at = NOW()
               RETURNING id"#,
        )
        .bind(wallet)
        .bind(nickname)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    // -- Route / POI Operations --

    pub async fn list_routes(&self) -> anyhow::Result<Vec<RouteRow>> {
        let rows = sqlx::query_as::<_, RouteRow>(
            "SELECT id, name, description, estimated_minutes, created_at FROM routes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_route(&self, route_id: &str) -> anyhow::Result<Option<RouteRow>> {
        let row = sqlx::query_as::<_, RouteRow>(
            "SELECT id, name, description, estimated_minutes, created_at FROM routes WHERE id = $1",
        )
        .bind(route_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_pois(&self, route_id: &str) -> anyhow::Result<Vec<PoiRow>> {
        let rows = sqlx::query_as::<_, PoiRow>(
            r#"SELECT id, route_id, name, ordinal, latitude, longitude, task_prompt
               FROM pois WHERE route_id = $1 ORDER BY ordinal ASC"#,
        )
        .bind(route_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_poi(&self, poi_id: &str) -> anyhow::Result<Option<PoiRow>> {
        let row = sqlx::query_as::<_, PoiRow>(
            r#"SELECT id, route_id, name, ordinal, latitude, longitude, task_prompt
               FROM pois WHERE id = $1"#,
        )
        .bind(poi_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// The first not-yet-visited POI after the given ordinal, ascending.
    pub async fn next_poi_after(
        &self,
        route_id: &str,
        ordinal: i32,
    ) -> anyhow::Result<Option<PoiRow>> {
        let row = sqlx::query_as::<_, PoiRow>(
            r#"SELECT id, route_id, name, ordinal, latitude, longitude, task_prompt
               FROM pois WHERE route_id = $1 AND ordinal > $2
               ORDER BY ordinal ASC LIMIT 1"#,
        )
        .bind(route_id)
        .bind(ordinal)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn count_pois(&self, route_id: &str) -> anyhow::Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pois WHERE route_id = $1")
                .bind(route_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn insert_route(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
        estimated_minutes: i32,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO routes (id, name, description, estimated_minutes)
               VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(estimated_minutes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_poi(&self, poi: &PoiRow) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO pois (id, route_id, name, ordinal, latitude, longitude, task_prompt)
               VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(&poi.id)
        .bind(&poi.route_id)
        .bind(&poi.name)
        .bind(poi.ordinal)
        .bind(poi.latitude)
        .bind(poi.longitude)
        .bind(&poi.task_prompt)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -- Check-in Operations --

    /// Record a check-in unless one already exists for this (user, POI).
    ///
    /// The unique constraint on (user_id, poi_id) is the dedup authority:
    /// returns `None` when the row already existed, so two concurrent
    /// submissions resolve to exactly one stored check-in instead of the
    /// loser surfacing a constraint violation.
    pub async fn insert_checkin(&self, checkin: &NewCheckin) -> anyhow::Result<Option<CheckinRow>> {
        let row = sqlx::query_as::<_, CheckinRow>(
            r#"INSERT INTO checkins (user_id, route_id, poi_id, status, signature, message, task_data)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (user_id, poi_id) DO NOTHING
               RETURNING id, user_id, route_id, poi_id, status, signature, message, task_data, created_at"#,
        )
        .bind(checkin.user_id)
        .bind(&checkin.route_id)
        .bind(&checkin.poi_id)
        .bind(checkin.status)
        .bind(&checkin.signature)
        .bind(&checkin.message)
        .bind(&checkin.task_data)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn count_approved_checkins(
        &self,
        user_id: Uuid,
        route_id: &str,
    ) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM checkins
               WHERE user_id = $1 AND route_id = $2 AND status = 'approved'"#,
        )
        .bind(user_id)
        .bind(route_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Distinct (user, route) pairs with at least one approved check-in.
    /// Input set for the completion sweep.
    pub async fn list_completion_candidates(&self) -> anyhow::Result<Vec<CompletionCandidate>> {
        let rows = sqlx::query_as::<_, CompletionCandidate>(
            "SELECT DISTINCT user_id, route_id FROM checkins WHERE status = 'approved'",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_checkins(
        &self,
        route_id: Option<&str>,
        poi_id: Option<&str>,
        status: Option<CheckinStatus>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<CheckinListRow>> {
        let rows = sqlx::query_as::<_, CheckinListRow>(
            r#"SELECT c.id, c.status, c.task_data, c.created_at,
                      c.poi_id, p.name AS poi_name, p.ordinal AS poi_ordinal,
                      c.route_id, r.name AS route_name,
                      u.wallet_address, u.nickname
               FROM checkins c
               JOIN pois p ON p.id = c.poi_id
               JOIN routes r ON r.id = c.route_id
               JOIN users u ON u.id = c.user_id
               WHERE ($1::varchar IS NULL OR c.route_id = $1)
                 AND ($2::varchar IS NULL OR c.poi_id = $2)
                 AND ($3::varchar IS NULL OR c.status = $3)
               ORDER BY c.created_at DESC
               LIMIT $4 OFFSET $5"#,
        )
        .bind(route_id)
        .bind(poi_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_checkins(
        &self,
        route_id: Option<&str>,
        poi_id: Option<&str>,
        status: Option<CheckinStatus>,
    ) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM checkins c
               WHERE ($1::varchar IS NULL OR c.route_id = $1)
                 AND ($2::varchar IS NULL OR c.poi_id = $2)
                 AND ($3::varchar IS NULL OR c.status = $3)"#,
        )
        .bind(route_id)
        .bind(poi_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // -- Voucher Operations --

    /// Create the voucher for a completed (user, route) pair.
    ///
    /// The unique constraint on (user_id, route_id) is the dedup authority:
    /// returns `Some(id)` only when this call actually inserted the row, so
    /// concurrent or repeated evaluations enqueue the mint exactly once.
    pub async fn create_voucher_if_absent(
        &self,
        user_id: Uuid,
        route_id: &str,
    ) -> anyhow::Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"INSERT INTO vouchers (user_id, route_id, status)
               VALUES ($1, $2, 'pending')
               ON CONFLICT (user_id, route_id) DO NOTHING
               RETURNING id"#,
        )
        .bind(user_id)
        .bind(route_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_voucher(&self, id: Uuid) -> anyhow::Result<Option<VoucherRow>> {
        let row = sqlx::query_as::<_, VoucherRow>(
            r#"SELECT id, user_id, route_id, status, nft_token_id, mint_tx_hash, metadata,
                      created_at, updated_at
               FROM vouchers WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Claim a pending voucher for minting. Compare-and-set on status so a
    /// re-queued id that was already advanced is not processed twice.
    pub async fn claim_voucher_for_minting(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"UPDATE vouchers SET status = 'minting', updated_at = NOW()
               WHERE id = $1 AND status = 'pending'"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn complete_voucher_minted(
        &self,
        id: Uuid,
        nft_token_id: Option<&str>,
        mint_tx_hash: Option<&str>,
        metadata: &serde_json::Value,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"UPDATE vouchers
               SET status = 'minted', nft_token_id = $2, mint_tx_hash = $3,
                   metadata = $4, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(nft_token_id)
        .bind(mint_tx_hash)
        .bind(metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_voucher_failed(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"UPDATE vouchers SET status = 'failed', updated_at = NOW() WHERE id = $1"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Operator re-trigger: reset a failed voucher to pending.
    pub async fn reset_failed_voucher(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"UPDATE vouchers
               SET status = 'pending', nft_token_id = NULL, mint_tx_hash = NULL, updated_at = NOW()
               WHERE id = $1 AND status = 'failed'"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All vouchers awaiting a mint, oldest first. Startup recovery re-feeds
    /// these into the queue; `minting` rows are mints interrupted by a crash.
    pub async fn list_unfinished_voucher_ids(&self) -> anyhow::Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT id FROM vouchers WHERE status IN ('pending', 'minting')
               ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Reset vouchers stuck in `minting` back to `pending` (crash recovery).
    pub async fn release_stuck_minting(&self) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"UPDATE vouchers SET status = 'pending', updated_at = NOW()
               WHERE status = 'minting'"#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Latest successfully minted voucher for a wallet, with its metadata.
    pub async fn latest_minted_for_wallet(
        &self,
        wallet: &str,
    ) -> anyhow::Result<Option<MintedVoucherRow>> {
        let row = sqlx::query_as::<_, MintedVoucherRow>(
            r#"SELECT v.id, v.nft_token_id, v.mint_tx_hash, v.metadata, r.name AS route_name
               FROM vouchers v
               JOIN users u ON u.id = v.user_id
               JOIN routes r ON r.id = v.route_id
               WHERE u.wallet_address = $1
                 AND v.status = 'minted'
                 AND v.nft_token_id IS NOT NULL
               ORDER BY v.created_at DESC
               LIMIT 1"#,
        )
        .bind(wallet)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait::async_trait]
impl super::MintStore for PgStore {
    async fn get_voucher(&self, id: Uuid) -> anyhow::Result<Option<VoucherRow>> {
        PgStore::get_voucher(self, id).await
    }

    async fn claim_voucher_for_minting(&self, id: Uuid) -> anyhow::Result<bool> {
        PgStore::claim_voucher_for_minting(self, id).await
    }

    async fn get_user(&self, id: Uuid) -> anyhow::Result<Option<UserRow>> {
        PgStore::get_user(self, id).await
    }

    async fn get_route(&self, route_id: &str) -> anyhow::Result<Option<RouteRow>> {
        PgStore::get_route(self, route_id).await
    }

    async fn count_pois(&self, route_id: &str) -> anyhow::Result<i64> {
        PgStore::count_pois(self, route_id).await
    }

    async fn complete_voucher_minted(
        &self,
        id: Uuid,
        nft_token_id: Option<&str>,
        mint_tx_hash: Option<&str>,
        metadata: &serde_json::Value,
    ) -> anyhow::Result<()> {
        PgStore::complete_voucher_minted(self, id, nft_token_id, mint_tx_hash, metadata).await
    }

    async fn mark_voucher_failed(&self, id: Uuid) -> anyhow::Result<()> {
        PgStore::mark_voucher_failed(self, id).await
    }
}

// -- Row types --

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub wallet_address: String,
    pub nickname: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Check-in joined with its POI, route and user for listing.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CheckinListRow {
    pub id: Uuid,
    pub status: CheckinStatus,
    pub task_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub poi_id: String,
    pub poi_name: String,
    pub poi_ordinal: i32,
    pub route_id: String,
    pub route_name: String,
    pub wallet_address: String,
    pub nickname: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MintedVoucherRow {
    pub id: Uuid,
    pub nft_token_id: Option<String>,
    pub mint_tx_hash: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub route_name: String,
}
