// --- File: crates/clinicbot_common/src/models.rs ---
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of every appointment.
pub const SLOT_MINUTES: i64 = 60;

pub fn slot_duration() -> Duration {
    Duration::minutes(SLOT_MINUTES)
}

/// Chat identity of a client, as supplied by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation a reply is delivered to. Equals the user id in private chats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A confirmed appointment as stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    /// Absent only for records created by hand.
    pub user_id: Option<UserId>,
    pub name: String,
    pub contact: String,
    pub appointment_at: DateTime<Utc>,
    /// Calendar event spanning `appointment_at .. appointment_at + 1h`.
    pub event_id: Option<String>,
}

impl Booking {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.appointment_at + slot_duration()
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id == Some(user)
    }
}

/// A booking that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub user_id: Option<UserId>,
    pub name: String,
    pub contact: String,
    pub appointment_at: DateTime<Utc>,
    pub event_id: Option<String>,
}

impl NewBooking {
    pub fn into_booking(self, id: i64) -> Booking {
        Booking {
            id,
            user_id: self.user_id,
            name: self.name,
            contact: self.contact,
            appointment_at: self.appointment_at,
            event_id: self.event_id,
        }
    }
}

/// An inline button; `payload` is what comes back in the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Transport-neutral outgoing message: text plus rows of inline buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub buttons: Vec<Vec<Button>>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Vec<Button>>) -> Self {
        self.buttons = buttons;
        self
    }

    /// All payloads, row by row. Handy in tests.
    pub fn payloads(&self) -> Vec<&str> {
        self.buttons
            .iter()
            .flatten()
            .map(|b| b.payload.as_str())
            .collect()
    }
}
