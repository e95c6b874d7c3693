use axum::{
    extract::{Extension, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use aperture_core::session::{Principal, Role, SessionRecord};

use crate::csrf::CSRF_HEADER;
use crate::error::AppError;
use crate::middleware::session::{generate_session_id, SessionContext, SessionCookieAction};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub expires: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub session_store: &'static str,
    pub uptime: i64,
    pub timestamp: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/admin/login
pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    body: Option<Json<LoginRequest>>,
) -> Result<Response, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let username = req.username.unwrap_or_default();
    let password = req.password.unwrap_or_default();

    // Uniform rejection: never reveal which credential was wrong.
    if username != state.config.admin.username || password != state.config.admin.password {
        info!("Rejected admin login attempt");
        return Err(AppError::Authentication("Invalid credentials".to_string()));
    }

    // Regenerate the session so the pre-login cookie cannot be replayed.
    if let Err(e) = state.sessions.destroy(&ctx.id).await {
        tracing::error!("Failed to destroy pre-login session: {}", e);
    }

    let expires_at = Utc::now() + Duration::seconds(state.config.session.admin_ttl_seconds as i64);
    let mut record = SessionRecord::new(generate_session_id());
    record.principal = Some(Principal {
        username: username.clone(),
        role: Role::Admin,
        expires_at,
    });
    state
        .sessions
        .save(&record)
        .await
        .map_err(anyhow::Error::from_boxed)?;

    info!("Admin login for {}", username);

    let mut response = Json(LoginResponse {
        success: true,
        expires: expires_at.timestamp(),
    })
    .into_response();
    response
        .extensions_mut()
        .insert(SessionCookieAction::Set(record.id));
    Ok(response)
}

/// POST /api/admin/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<Response, AppError> {
    state
        .sessions
        .destroy(&ctx.id)
        .await
        .map_err(anyhow::Error::from_boxed)?;

    let mut response = Json(json!({ "success": true })).into_response();
    response.extensions_mut().insert(SessionCookieAction::Clear);
    Ok(response)
}

/// GET /api/admin/check-auth
///
/// Reports the session's admin flag without touching it.
pub async fn check_auth(
    Extension(ctx): Extension<SessionContext>,
    headers: HeaderMap,
) -> Response {
    let now = Utc::now();
    let authenticated = ctx.record.admin_active(now);
    let presented = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());

    let body = json!({
        "authenticated": authenticated,
        "username": if authenticated { ctx.record.username() } else { None },
        "csrfValid": ctx.record.csrf_valid(presented, now),
    });

    ([(header::CACHE_CONTROL, "no-store")], Json(body)).into_response()
}

/// GET /api/admin/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let session_healthy = state.sessions.healthy().await;
    let backend = state.sessions.backend();

    let database = match (backend, session_healthy) {
        ("redis", true) => "connected",
        ("redis", false) => "disconnected",
        _ => "in-memory",
    };

    Json(HealthResponse {
        status: "ok",
        database,
        session_store: backend,
        uptime: (Utc::now() - state.started_at).num_seconds(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
