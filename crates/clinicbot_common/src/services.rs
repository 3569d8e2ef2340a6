//! Capability traits for the external systems the bot talks to.
//!
//! The booking flow only ever sees these traits, so tests can plug in fakes
//! for the calendar and the chat transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use crate::error::{GatewayError, TransportError};
use crate::models::{ChatId, OutgoingMessage};

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Calendar backend operations.
///
/// Implementations map their own failures onto [`GatewayError`] so callers can
/// distinguish an unreachable backend from a rejected call or a missing event.
pub trait CalendarService: Send + Sync {
    /// Busy intervals overlapping `[start_time, end_time)`, sorted by start.
    #[allow(clippy::type_complexity)]
    fn get_busy_times(
        &self,
        calendar_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<(DateTime<Utc>, DateTime<Utc>)>, GatewayError>;

    /// Create an event. No deduplication is performed.
    fn create_event(
        &self,
        calendar_id: &str,
        event: CalendarEvent,
    ) -> BoxFuture<'_, CalendarEventResult, GatewayError>;

    /// Delete an event; `GatewayError::NotFound` if it is already gone.
    fn delete_event(&self, calendar_id: &str, event_id: &str) -> BoxFuture<'_, (), GatewayError>;
}

/// Outbound side of the chat transport.
pub trait ChatTransport: Send + Sync {
    fn send(&self, chat: ChatId, message: OutgoingMessage) -> BoxFuture<'_, (), TransportError>;

    /// Acknowledge a button press so the client stops its spinner.
    fn answer_callback(&self, callback_id: &str) -> BoxFuture<'_, (), TransportError>;
}

/// Event to be created in the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub summary: String,
    pub description: Option<String>,
    /// IANA zone the event is displayed in, e.g. "Europe/Moscow".
    pub time_zone: String,
}

/// Result of a successful event creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEventResult {
    pub event_id: String,
    pub html_link: Option<String>,
}
