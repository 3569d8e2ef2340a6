//! Repository for bookings
//!
//! The store is a thin persistence boundary: it enforces no uniqueness per
//! slot and performs no business validation. Double booking is prevented by
//! the free/busy check in the booking flow.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use std::future::Future;

pub use clinicbot_common::models::{Booking, NewBooking, UserId};

/// Repository for bookings
pub trait BookingRepository: Send + Sync {
    /// Create the `bookings` table and its indexes if they don't exist yet.
    fn init_schema(&self) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Insert a booking, returning it with the id assigned by the store.
    fn create(&self, booking: NewBooking) -> impl Future<Output = Result<Booking, DbError>> + Send;

    /// Fails with [`DbError::NotFound`] for an unknown id.
    fn get_by_id(&self, id: i64) -> impl Future<Output = Result<Booking, DbError>> + Send;

    /// Fails with [`DbError::NotFound`] when nothing was deleted.
    fn delete_by_id(&self, id: i64) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Bookings of one user, ordered by appointment time.
    fn list_by_owner(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Booking>, DbError>> + Send;

    /// Every booking, ordered by appointment time.
    fn list_all(&self) -> impl Future<Output = Result<Vec<Booking>, DbError>> + Send;

    /// Bookings with an owner and `from <= appointment_at < to`, ordered by appointment time.
    fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Booking>, DbError>> + Send;
}
