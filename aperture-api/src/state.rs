use std::sync::Arc;

use aperture_core::repository::{BookingRepository, MessageRepository};
use aperture_core::session::SessionStore;
use aperture_store::app_config::Config;
use aperture_store::Mailer;
use chrono::{DateTime, Utc};

use crate::middleware::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<dyn BookingRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub mailer: Arc<Mailer>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<Config>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn production(&self) -> bool {
        self.config.server.environment == "production"
    }
}
