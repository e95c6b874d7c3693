use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use aperture_core::session::SessionRecord;

use crate::error::AppError;
use crate::middleware::session::SessionContext;
use crate::state::AppState;

pub const CSRF_HEADER: &str = "x-csrf-token";

/// A freshly minted token plus its expiry (epoch seconds), as returned to
/// clients on every mint and on every state-changing response.
#[derive(Debug, Clone, Serialize)]
pub struct CsrfGrant {
    pub token: String,
    pub expires: i64,
}

fn mint_token_value() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Mints a new token into the session, replacing any previous one.
pub async fn mint(state: &AppState, session_id: &str) -> Result<CsrfGrant, AppError> {
    let mut record = state
        .sessions
        .load(session_id)
        .await
        .map_err(anyhow::Error::from_boxed)?
        .unwrap_or_else(|| SessionRecord::new(session_id.to_string()));

    let token = mint_token_value();
    let expires_at = Utc::now() + Duration::seconds(state.config.session.csrf_ttl_seconds as i64);
    record.csrf_token = Some(token.clone());
    record.csrf_expires_at = Some(expires_at);
    state
        .sessions
        .save(&record)
        .await
        .map_err(anyhow::Error::from_boxed)?;

    Ok(CsrfGrant {
        token,
        expires: expires_at.timestamp(),
    })
}

/// Checks the presented token against the session and rotates it either way,
/// so both outcomes hand the client a usable replacement. Must be called
/// before any store mutation.
pub async fn validate_and_rotate(
    state: &AppState,
    ctx: &SessionContext,
    presented: Option<&str>,
) -> Result<CsrfGrant, AppError> {
    let now = Utc::now();
    let valid = match state
        .sessions
        .load(&ctx.id)
        .await
        .map_err(anyhow::Error::from_boxed)?
    {
        Some(record) => match presented {
            Some(token) => record.csrf_valid(Some(token), now),
            None => false,
        },
        None => false,
    };

    let fresh = mint(state, &ctx.id).await?;
    if valid {
        Ok(fresh)
    } else {
        Err(AppError::Csrf { fresh: Some(fresh) })
    }
}

/// Token may arrive in the `x-csrf-token` header or a `csrfToken` body field.
pub fn token_from_parts(headers: &HeaderMap, body_token: Option<&str>) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| body_token.map(str::to_string))
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/csrf-token", get(issue_token))
        .route("/api/csrf-token", get(issue_token))
}

/// GET /api/csrf-token
async fn issue_token(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<Json<CsrfGrant>, AppError> {
    let grant = mint(&state, &ctx.id).await?;
    Ok(Json(grant))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_tokens_are_opaque_and_distinct() {
        let a = mint_token_value();
        let b = mint_token_value();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
