use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use crate::AppState;

pub mod handlers;

/// Build the API router. All routes are relative — the caller mounts this
/// under `/api/v1`.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route("/mint/queue", get(handlers::mint_queue_status))
        .route("/vouchers/:id/retry", post(handlers::retry_voucher))
        .layer(middleware::from_fn_with_state(state, admin_auth));

    Router::new()
        .route(
            "/checkins",
            get(handlers::list_checkins).post(handlers::create_checkin),
        )
        .route("/routes", get(handlers::list_routes))
        .route("/routes/:id", get(handlers::get_route))
        .route("/checkmint", get(handlers::checkmint))
        .route("/metadata/:id", get(handlers::get_metadata))
        .merge(admin)
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: validates `X-Admin-Key` against the configured admin key.
async fn admin_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided_key = req
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim())
        });

    match provided_key {
        Some(k) if k == state.config.admin_key => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("admin API: invalid key");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("admin API: missing X-Admin-Key header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
