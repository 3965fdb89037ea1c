use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::completion;
use crate::models::checkin::{CheckinStatus, NewCheckin};
use crate::models::route::{NextPoi, RouteProgress};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct CheckinRequest {
    pub route_id: String,
    pub poi_id: String,
    pub wallet_address: String,
    pub signature: String,
    pub message: String,
    /// Arbitrary task payload (quiz answer, photo URL, ...); stored verbatim.
    /// Unknown envelope fields (location, device_info) are accepted and ignored.
    #[serde(default)]
    pub task_data: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct CheckinResponse {
    pub checkin_id: Uuid,
    pub status: CheckinStatus,
    pub poi: PoiSummary,
    pub route_progress: RouteProgress,
    pub nft_status: NftStatus,
}

#[derive(Serialize)]
pub struct PoiSummary {
    pub id: String,
    pub name: String,
    pub ordinal: i32,
}

#[derive(Serialize)]
pub struct NftStatus {
    pub will_mint: bool,
    pub remaining_pois: i64,
}

#[derive(Deserialize)]
pub struct CheckinListParams {
    pub route_id: Option<String>,
    pub poi_id: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct WalletParams {
    pub wallet: Option<String>,
}

// ── Check-ins ────────────────────────────────────────────────

/// POST /api/v1/checkins — record a signed check-in and report progress.
pub async fn create_checkin(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckinRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.route_id.is_empty() {
        return Err(AppError::MissingField("route_id"));
    }
    if payload.poi_id.is_empty() {
        return Err(AppError::MissingField("poi_id"));
    }
    if payload.wallet_address.is_empty() {
        return Err(AppError::MissingField("wallet_address"));
    }
    if payload.signature.is_empty() {
        return Err(AppError::MissingField("signature"));
    }
    if payload.message.is_empty() {
        return Err(AppError::MissingField("message"));
    }

    let user = state
        .db
        .get_user_by_wallet(&payload.wallet_address)
        .await?
        .ok_or(AppError::UserNotFound)?;

    // The POI must exist and belong to the claimed route, else the
    // completion threshold could be gamed with a forged route_id.
    let poi = state
        .db
        .get_poi(&payload.poi_id)
        .await?
        .filter(|p| p.route_id == payload.route_id)
        .ok_or(AppError::PoiMismatch)?;

    // Auto-approval: no review step in the primary path. Duplicate detection
    // rides on the (user_id, poi_id) unique index inside the insert itself, so
    // two concurrent submissions resolve to one row and one 400, not a
    // constraint violation for whichever request loses the race.
    let checkin = state
        .db
        .insert_checkin(&NewCheckin {
            user_id: user.id,
            route_id: payload.route_id.clone(),
            poi_id: payload.poi_id.clone(),
            status: CheckinStatus::Approved,
            signature: payload.signature,
            message: payload.message,
            task_data: payload.task_data,
        })
        .await?
        .ok_or(AppError::DuplicateCheckin)?;

    // Direct completion trigger. Failure here must not fail the check-in;
    // the periodic sweep will catch the pair up.
    if let Err(e) = completion::evaluate(&state.db, &state.queue, user.id, &payload.route_id).await
    {
        tracing::error!(
            user_id = %user.id,
            route_id = %payload.route_id,
            error = %e,
            "completion evaluation failed after check-in"
        );
    }

    let completed = state
        .db
        .count_approved_checkins(user.id, &payload.route_id)
        .await?;
    let total = state.db.count_pois(&payload.route_id).await?;
    let next_poi = state
        .db
        .next_poi_after(&payload.route_id, poi.ordinal)
        .await?
        .map(|p| NextPoi {
            id: p.id,
            name: p.name,
        });

    let progress = RouteProgress::new(completed, total, next_poi);
    let response = CheckinResponse {
        checkin_id: checkin.id,
        status: checkin.status,
        nft_status: NftStatus {
            will_mint: progress.is_route_completed,
            remaining_pois: progress.remaining(),
        },
        poi: PoiSummary {
            id: poi.id,
            name: poi.name,
            ordinal: poi.ordinal,
        },
        route_progress: progress,
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": response,
            "timestamp": Utc::now(),
        })),
    ))
}

/// GET /api/v1/checkins — filterable, paginated check-in list.
pub async fn list_checkins(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CheckinListParams>,
) -> Result<impl IntoResponse, AppError> {
    let status = match params.status.as_deref() {
        None => None,
        Some(s) => Some(parse_status(s)?),
    };
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * limit;

    let total = state
        .db
        .count_checkins(params.route_id.as_deref(), params.poi_id.as_deref(), status)
        .await?;
    let checkins = state
        .db
        .list_checkins(
            params.route_id.as_deref(),
            params.poi_id.as_deref(),
            status,
            limit,
            offset,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "checkins": checkins,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "pages": (total + limit - 1) / limit,
            },
        },
        "timestamp": Utc::now(),
    })))
}

fn parse_status(s: &str) -> Result<CheckinStatus, AppError> {
    match s {
        "pending" => Ok(CheckinStatus::Pending),
        "approved" => Ok(CheckinStatus::Approved),
        "rejected" => Ok(CheckinStatus::Rejected),
        "flagged" => Ok(CheckinStatus::Flagged),
        _ => Err(AppError::InvalidField("status")),
    }
}

// ── Routes ───────────────────────────────────────────────────

/// GET /api/v1/routes — reference data for all routes.
pub async fn list_routes(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let routes = state.db.list_routes().await?;
    Ok(Json(json!({ "success": true, "data": routes })))
}

/// GET /api/v1/routes/:id — one route with its POIs; per-user progress when
/// `?wallet=0x…` is supplied.
pub async fn get_route(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<String>,
    Query(params): Query<WalletParams>,
) -> Result<impl IntoResponse, AppError> {
    let route = state
        .db
        .get_route(&route_id)
        .await?
        .ok_or(AppError::RouteNotFound)?;
    let pois = state.db.list_pois(&route_id).await?;

    let progress = match params.wallet.as_deref() {
        Some(wallet) => {
            let user = state
                .db
                .get_user_by_wallet(wallet)
                .await?
                .ok_or(AppError::UserNotFound)?;
            let completed = state.db.count_approved_checkins(user.id, &route_id).await?;
            Some(RouteProgress::new(completed, pois.len() as i64, None))
        }
        None => None,
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "route": route,
            "pois": pois,
            "progress": progress,
        },
    })))
}

// ── Mint results ─────────────────────────────────────────────

/// GET /api/v1/checkmint?wallet=0x… — latest minted NFT for a wallet.
/// Clients poll this after completing a route.
pub async fn checkmint(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WalletParams>,
) -> Result<impl IntoResponse, AppError> {
    let wallet = params
        .wallet
        .filter(|w| !w.is_empty())
        .ok_or(AppError::MissingField("wallet"))?;

    match state.db.latest_minted_for_wallet(&wallet).await? {
        Some(v) => Ok(Json(json!({
            "success": true,
            "nft_token_id": v.nft_token_id,
            "mint_tx_hash": v.mint_tx_hash,
            "metadata": v.metadata,
            "route_name": v.route_name,
        }))),
        None => Ok(Json(json!({
            "success": false,
            "message": "no minted NFT found for this wallet",
        }))),
    }
}

/// GET /api/v1/metadata/:id — standard NFT metadata for a voucher.
pub async fn get_metadata(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let voucher = state
        .db
        .get_voucher(id)
        .await?
        .ok_or(AppError::VoucherNotFound)?;
    let metadata = voucher.metadata.ok_or(AppError::VoucherNotFound)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CACHE_CONTROL,
        "public, max-age=300".parse().expect("static header value"),
    );
    Ok((headers, Json(metadata)))
}

// ── Admin ────────────────────────────────────────────────────

/// GET /api/v1/mint/queue — queue depth and worker counters.
pub async fn mint_queue_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.queue.status())
}

/// POST /api/v1/vouchers/:id/retry — reset a failed voucher and re-enqueue.
pub async fn retry_voucher(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let voucher = state
        .db
        .get_voucher(id)
        .await?
        .ok_or(AppError::VoucherNotFound)?;

    if !state.db.reset_failed_voucher(id).await? {
        return Err(AppError::VoucherNotRetryable(
            serde_json::to_value(voucher.status)
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_else(|| "unknown".into()),
        ));
    }

    state.queue.enqueue(id);
    tracing::info!(voucher_id = %id, "failed voucher reset and re-enqueued");
    Ok(Json(json!({ "success": true, "voucher_id": id, "status": "pending" })))
}
