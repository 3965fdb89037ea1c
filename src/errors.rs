use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("user not found")]
    UserNotFound,

    #[error("poi not found or not part of route")]
    PoiMismatch,

    #[error("already checked in at this poi")]
    DuplicateCheckin,

    #[error("route not found")]
    RouteNotFound,

    #[error("voucher not found")]
    VoucherNotFound,

    #[error("voucher is not retryable in status '{0}'")]
    VoucherNotRetryable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "missing_field",
                format!("missing required field: {}", field),
            ),
            AppError::InvalidField(field) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_field",
                format!("invalid value for field: {}", field),
            ),
            AppError::UserNotFound => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "user_not_found",
                "no user registered for this wallet address".to_string(),
            ),
            AppError::PoiMismatch => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "poi_mismatch",
                "poi does not exist or does not belong to the given route".to_string(),
            ),
            AppError::DuplicateCheckin => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "duplicate_checkin",
                "this poi has already been checked in".to_string(),
            ),
            AppError::RouteNotFound => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "route_not_found",
                "route not found".to_string(),
            ),
            AppError::VoucherNotFound => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "voucher_not_found",
                "voucher not found".to_string(),
            ),
            AppError::VoucherNotRetryable(s) => (
                StatusCode::CONFLICT,
                "invalid_request_error",
                "voucher_not_retryable",
                format!("only failed vouchers can be retried (current status: {})", s),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
