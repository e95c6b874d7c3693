use axum::{
    extract::{Extension, Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use aperture_core::message::ContactMessage;

use crate::csrf;
use crate::error::AppError;
use crate::middleware::session::SessionContext;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    // Flags arrive as raw strings; anything other than "true" leaves the
    // default behavior in place.
    #[serde(rename = "includeArchived")]
    pub include_archived: Option<String>,
    pub unread: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkReadRequest {
    #[serde(rename = "csrfToken")]
    pub csrf_token: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/admin/messages?includeArchived=&unread=
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<ContactMessage>>, AppError> {
    let messages = state
        .messages
        .list(
            query.include_archived.as_deref() == Some("true"),
            query.unread.as_deref() == Some("true"),
        )
        .await?;
    Ok(Json(messages))
}

/// GET /api/admin/messages/{id}
///
/// A plain read; marking a message read is its own endpoint.
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContactMessage>, AppError> {
    let id = parse_message_id(&id)?;
    let message = state
        .messages
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;
    Ok(Json(message))
}

/// POST /api/admin/messages/{id}/mark-read
pub async fn mark_message_read(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<MarkReadRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let presented = csrf::token_from_parts(
        &headers,
        body.as_ref().and_then(|b| b.csrf_token.as_deref()),
    );
    let fresh = csrf::validate_and_rotate(&state, &ctx, presented.as_deref()).await?;

    let id = parse_message_id(&id)?;
    let message = state
        .messages
        .mark_read(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

    info!("Message marked as read: {}", message.id);

    Ok(Json(json!({
        "success": true,
        "message": "Message marked as read",
        "data": message,
        "csrfToken": fresh.token,
        "csrfExpires": fresh.expires,
    })))
}

fn parse_message_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Message not found".to_string()))
}
