use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use aperture_core::booking::{Booking, BookingStatus};

use crate::csrf;
use crate::error::AppError;
use crate::middleware::session::SessionContext;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub id: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmBookingRequest {
    #[serde(rename = "csrfToken")]
    pub csrf_token: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/admin/bookings?status=
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        // An unrecognised status matches nothing rather than erroring.
        Some(raw) => match raw.parse::<BookingStatus>() {
            Ok(status) => Some(status),
            Err(_) => return Ok(Json(Vec::new())),
        },
    };

    let bookings = state
        .bookings
        .list(status)
        .await
        .map_err(anyhow::Error::from_boxed)?;
    Ok(Json(bookings))
}

/// GET /api/admin/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let id = parse_booking_id(&id)?;
    let booking = state
        .bookings
        .get(id)
        .await
        .map_err(anyhow::Error::from_boxed)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
    Ok(Json(booking))
}

/// POST /api/admin/bookings/{id}/confirm
pub async fn confirm_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<ConfirmBookingRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let presented = csrf::token_from_parts(
        &headers,
        body.as_ref().and_then(|b| b.csrf_token.as_deref()),
    );
    let fresh = csrf::validate_and_rotate(&state, &ctx, presented.as_deref()).await?;

    let id = parse_booking_id(&id)?;
    let booking = state
        .bookings
        .confirm(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    info!("Booking confirmed: {}", booking.id);

    Ok(Json(json!({
        "success": true,
        "message": "Booking confirmed",
        "data": booking,
        "csrfToken": fresh.token,
        "csrfExpires": fresh.expires,
    })))
}

/// GET /api/admin/bookings/export?id=&format=json
pub async fn export_bookings(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    if let Some(format) = query.format.as_deref().filter(|f| !f.is_empty()) {
        if !format.eq_ignore_ascii_case("json") {
            return Err(AppError::Validation("Unsupported export format".to_string()));
        }
    }

    let (payload, filename) = match query.id.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => {
            let id = parse_booking_id(raw)?;
            let booking = state
                .bookings
                .get(id)
                .await?
                .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
            (serde_json::to_string_pretty(&booking)?, format!("booking-{}.json", id))
        }
        None => {
            let bookings = state.bookings.list(None).await?;
            (
                serde_json::to_string_pretty(&bookings)?,
                "bookings-export.json".to_string(),
            )
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        payload,
    )
        .into_response())
}

// Ids arrive as raw path/query strings; anything that is not a UUID can never
// name a booking, so it reads as not-found rather than a malformed request.
fn parse_booking_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Booking not found".to_string()))
}
