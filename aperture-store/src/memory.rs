use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use aperture_core::booking::{Booking, BookingStatus};
use aperture_core::message::ContactMessage;
use aperture_core::repository::{BookingRepository, MessageRepository, RepoResult};
use aperture_core::session::{SessionRecord, SessionResult, SessionStore};

/// Process-lifetime booking store. Insertion order is the order of public
/// submissions; nothing ever removes a record.
pub struct MemoryBookingRepository {
    bookings: RwLock<Vec<Booking>>,
}

impl MemoryBookingRepository {
    pub fn new() -> Self {
        Self {
            bookings: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryBookingRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingRepository for MemoryBookingRepository {
    async fn create(&self, booking: Booking) -> RepoResult<Booking> {
        let mut bookings = self.bookings.write().await;
        bookings.push(booking.clone());
        Ok(booking)
    }

    async fn list(&self, status: Option<BookingStatus>) -> RepoResult<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        let mut result: Vec<Booking> = bookings
            .iter()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.event_date.cmp(&a.event_date));
        Ok(result)
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn confirm(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        let mut bookings = self.bookings.write().await;
        match bookings.iter_mut().find(|b| b.id == id) {
            Some(booking) => {
                booking.status = BookingStatus::Confirmed;
                booking.updated_at = Some(Utc::now());
                Ok(Some(booking.clone()))
            }
            None => Ok(None),
        }
    }
}

/// Process-lifetime contact-message store, same ownership rules as bookings.
pub struct MemoryMessageRepository {
    messages: RwLock<Vec<ContactMessage>>,
}

impl MemoryMessageRepository {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryMessageRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn create(&self, message: ContactMessage) -> RepoResult<ContactMessage> {
        let mut messages = self.messages.write().await;
        messages.push(message.clone());
        Ok(message)
    }

    async fn list(&self, include_archived: bool, unread_only: bool) -> RepoResult<Vec<ContactMessage>> {
        let messages = self.messages.read().await;
        let mut result: Vec<ContactMessage> = messages
            .iter()
            .filter(|m| include_archived || !m.archived)
            .filter(|m| !unread_only || !m.read)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        Ok(result)
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<ContactMessage>> {
        let messages = self.messages.read().await;
        Ok(messages.iter().find(|m| m.id == id).cloned())
    }

    async fn mark_read(&self, id: Uuid) -> RepoResult<Option<ContactMessage>> {
        let mut messages = self.messages.write().await;
        match messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.read = true;
                message.read_at = Some(Utc::now());
                Ok(Some(message.clone()))
            }
            None => Ok(None),
        }
    }
}

/// Session store held in process memory. Expired records are dropped lazily
/// on the next load.
pub struct MemorySessionStore {
    ttl_seconds: u64,
    sessions: RwLock<HashMap<String, (SessionRecord, DateTime<Utc>)>>,
}

impl MemorySessionStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> SessionResult<Option<SessionRecord>> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(id) {
            Some((record, expires_at)) if *expires_at > Utc::now() => Ok(Some(record.clone())),
            Some(_) => {
                sessions.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn save(&self, record: &SessionRecord) -> SessionResult<()> {
        let expires_at = Utc::now() + Duration::seconds(self.ttl_seconds as i64);
        let mut sessions = self.sessions.write().await;
        sessions.insert(record.id.clone(), (record.clone(), expires_at));
        Ok(())
    }

    async fn destroy(&self, id: &str) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id);
        Ok(())
    }

    async fn healthy(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
