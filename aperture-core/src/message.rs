use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subject used when a contact submission leaves the field empty.
pub const DEFAULT_SUBJECT: &str = "New inquiry from the website";

/// A contact-form inquiry submitted through the public site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub received_at: DateTime<Utc>,
    pub read: bool,
    pub archived: bool,
    pub read_at: Option<DateTime<Utc>>,
}
