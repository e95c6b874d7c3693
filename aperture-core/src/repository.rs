use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::message::ContactMessage;

pub type RepoResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Appends a booking; insertion order is preserved by the backing store.
    async fn create(&self, booking: Booking) -> RepoResult<Booking>;

    /// All bookings, optionally filtered by status, sorted by event date descending.
    async fn list(&self, status: Option<BookingStatus>) -> RepoResult<Vec<Booking>>;

    async fn get(&self, id: Uuid) -> RepoResult<Option<Booking>>;

    /// Moves the booking to confirmed and stamps `updated_at`. Returns the
    /// updated record, or `None` when the id is unknown.
    async fn confirm(&self, id: Uuid) -> RepoResult<Option<Booking>>;
}

/// Repository trait for contact-message data access
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: ContactMessage) -> RepoResult<ContactMessage>;

    /// All messages sorted by received timestamp descending. Archived records
    /// are excluded unless `include_archived`; `unread_only` drops read ones.
    async fn list(&self, include_archived: bool, unread_only: bool) -> RepoResult<Vec<ContactMessage>>;

    async fn get(&self, id: Uuid) -> RepoResult<Option<ContactMessage>>;

    /// Sets the read flag and `read_at`. The flag is one-way; nothing resets
    /// a message to unread.
    async fn mark_read(&self, id: Uuid) -> RepoResult<Option<ContactMessage>>;
}
