pub mod app_config;
pub mod mailer;
pub mod memory;
pub mod redis_repo;

pub use mailer::Mailer;
pub use memory::{MemoryBookingRepository, MemoryMessageRepository, MemorySessionStore};
pub use redis_repo::{RedisClient, RedisSessionStore};
