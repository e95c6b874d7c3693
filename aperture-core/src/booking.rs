use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// An event-photography service request submitted through the public site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub event_type: String,
    pub event_date: DateTime<Utc>,
    pub package: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub details: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
}

impl ToString for BookingStatus {
    fn to_string(&self) -> String {
        match self {
            BookingStatus::Pending => "pending".to_string(),
            BookingStatus::Confirmed => "confirmed".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown booking status: {0}")]
pub struct ParseBookingStatusError(String);

impl FromStr for BookingStatus {
    type Err = ParseBookingStatusError;

    // Status filters arrive as raw query strings; matching is case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("pending") {
            Ok(BookingStatus::Pending)
        } else if s.eq_ignore_ascii_case("confirmed") {
            Ok(BookingStatus::Confirmed)
        } else {
            Err(ParseBookingStatusError(s.to_string()))
        }
    }
}
