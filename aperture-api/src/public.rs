use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use aperture_core::booking::{Booking, BookingStatus};
use aperture_core::message::{ContactMessage, DEFAULT_SUBJECT};

use crate::csrf::{self, CsrfGrant};
use crate::error::AppError;
use crate::middleware::session::SessionContext;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub csrf_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub event_type: Option<String>,
    pub date: Option<String>,
    pub package: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub details: Option<String>,
    pub csrf_token: Option<String>,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/submit-contact", post(submit_contact))
        .route("/submit-booking", post(submit_booking))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/submit-contact
pub async fn submit_contact(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    headers: HeaderMap,
    body: Option<Json<ContactSubmission>>,
) -> Result<Response, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();

    // Token check comes first; nothing is stored for a rejected request.
    let presented = csrf::token_from_parts(&headers, req.csrf_token.as_deref());
    let fresh = csrf::validate_and_rotate(&state, &ctx, presented.as_deref()).await?;

    let missing = missing_fields(&[
        ("name", &req.name),
        ("email", &req.email),
        ("message", &req.message),
    ]);
    if !missing.is_empty() {
        return Ok(validation_failure(&missing, &fresh));
    }

    let record = ContactMessage {
        id: Uuid::new_v4(),
        name: req.name.unwrap_or_default(),
        email: req.email.unwrap_or_default(),
        phone: req.phone,
        subject: req
            .subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
        message: req.message.unwrap_or_default(),
        received_at: Utc::now(),
        read: false,
        archived: false,
        read_at: None,
    };

    let saved = state.messages.create(record).await?;
    info!("Contact message received: {}", saved.id);

    // Best-effort confirmation; the saved record stands regardless.
    let html = format!(
        "<p>Hi {},</p><p>Thanks for reaching out &mdash; we received your \
         message and will get back to you within two business days.</p>\
         <p>&mdash; Aperture Studio</p>",
        saved.name
    );
    let email_sent = state
        .mailer
        .send(&saved.email, "We received your message", html)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Message received",
            "messageId": saved.id,
            "emailSent": email_sent,
            "csrfToken": fresh.token,
            "csrfExpires": fresh.expires,
        })),
    )
        .into_response())
}

/// POST /submit-booking
pub async fn submit_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    headers: HeaderMap,
    body: Option<Json<BookingSubmission>>,
) -> Result<Response, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();

    let presented = csrf::token_from_parts(&headers, req.csrf_token.as_deref());
    let fresh = csrf::validate_and_rotate(&state, &ctx, presented.as_deref()).await?;

    let missing = missing_fields(&[
        ("name", &req.name),
        ("email", &req.email),
        ("phone", &req.phone),
        ("eventType", &req.event_type),
        ("date", &req.date),
        ("package", &req.package),
        ("startTime", &req.start_time),
        ("endTime", &req.end_time),
        ("location", &req.location),
    ]);
    if !missing.is_empty() {
        return Ok(validation_failure(&missing, &fresh));
    }

    let date = req.date.unwrap_or_default();
    let start_time = req.start_time.unwrap_or_default();
    let event_date = match combine_event_date(&date, &start_time) {
        Some(dt) => dt,
        None => {
            return Ok(validation_failure_message(
                format!("Invalid event date/time: {} {}", date, start_time),
                &fresh,
            ))
        }
    };

    let record = Booking {
        id: Uuid::new_v4(),
        name: req.name.unwrap_or_default(),
        email: req.email.unwrap_or_default(),
        phone: req.phone.unwrap_or_default(),
        event_type: req.event_type.unwrap_or_default(),
        event_date,
        package: req.package.unwrap_or_default(),
        start_time: Some(start_time),
        end_time: req.end_time,
        location: req.location,
        details: req.details,
        status: BookingStatus::Pending,
        created_at: Utc::now(),
        updated_at: None,
    };

    let saved = state.bookings.create(record).await?;
    info!("Booking request received: {}", saved.id);

    let html = format!(
        "<p>Hi {},</p><p>We received your {} booking request for {} \
         ({} package) and will confirm availability shortly.</p>\
         <p>&mdash; Aperture Studio</p>",
        saved.name,
        saved.event_type,
        saved.event_date.format("%B %-d, %Y at %H:%M"),
        saved.package
    );
    let email_sent = state
        .mailer
        .send(&saved.email, "We received your booking request", html)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Booking request received",
            "bookingId": saved.id,
            "emailSent": email_sent,
            "csrfToken": fresh.token,
            "csrfExpires": fresh.expires,
        })),
    )
        .into_response())
}

// ============================================================================
// Helpers
// ============================================================================

fn missing_fields<'a>(fields: &[(&'a str, &Option<String>)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |s| s.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect()
}

fn validation_failure(missing: &[&str], fresh: &CsrfGrant) -> Response {
    validation_failure_message(
        format!("Missing required fields: {}", missing.join(", ")),
        fresh,
    )
}

fn validation_failure_message(message: String, fresh: &CsrfGrant) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": message,
            "csrfToken": fresh.token,
            "csrfExpires": fresh.expires,
        })),
    )
        .into_response()
}

/// The public form submits the event date and start time as separate strings;
/// they combine into the single timestamp bookings are sorted by.
fn combine_event_date(date: &str, start_time: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(start_time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(start_time, "%H:%M:%S"))
        .ok()?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_event_date() {
        let dt = combine_event_date("2025-01-01", "10:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-01T10:00:00+00:00");

        let with_seconds = combine_event_date("2025-06-15", "09:30:15").unwrap();
        assert_eq!(with_seconds.to_rfc3339(), "2025-06-15T09:30:15+00:00");

        assert!(combine_event_date("01/01/2025", "10:00").is_none());
        assert!(combine_event_date("2025-01-01", "10am").is_none());
    }

    #[test]
    fn test_missing_fields_flags_empty_and_absent() {
        let name = Some("A".to_string());
        let blank = Some("   ".to_string());
        let absent: Option<String> = None;

        let missing = missing_fields(&[("name", &name), ("email", &blank), ("message", &absent)]);
        assert_eq!(missing, vec!["email", "message"]);
    }
}
