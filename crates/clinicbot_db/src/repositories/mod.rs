//! Repository modules for database access

pub mod booking;
pub mod booking_sql;

pub use booking::BookingRepository;
pub use booking_sql::SqlBookingRepository;
