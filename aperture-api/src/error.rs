use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::OnceLock;

use crate::csrf::CsrfGrant;

static EXPOSE_ERROR_DETAILS: OnceLock<bool> = OnceLock::new();

/// Internal-error bodies carry details only outside production.
pub fn set_expose_error_details(expose: bool) {
    let _ = EXPOSE_ERROR_DETAILS.set(expose);
}

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Authentication(String),
    /// Invalid or missing CSRF token. A replacement token rides along so the
    /// client can retry without a second round trip.
    Csrf { fresh: Option<CsrfGrant> },
    RateLimited { retry_at: i64 },
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Csrf { fresh } => {
                let mut body = json!({
                    "error": "Invalid or missing CSRF token",
                    "code": "INVALID_CSRF_TOKEN",
                });
                if let Some(grant) = fresh {
                    body["csrfToken"] = json!(grant.token);
                    body["csrfExpires"] = json!(grant.expires);
                }
                (StatusCode::FORBIDDEN, Json(body)).into_response()
            }
            AppError::RateLimited { retry_at } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Too many requests, please try again later",
                    "retryAfter": retry_at,
                })),
            )
                .into_response(),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                let mut body = json!({ "error": "Internal Server Error" });
                if EXPOSE_ERROR_DETAILS.get().copied().unwrap_or(false) {
                    body["details"] = json!(format!("{:#}", err));
                }
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
