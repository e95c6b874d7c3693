pub mod booking;
pub mod message;
pub mod repository;
pub mod session;

pub use booking::{Booking, BookingStatus};
pub use message::ContactMessage;
pub use session::SessionRecord;
