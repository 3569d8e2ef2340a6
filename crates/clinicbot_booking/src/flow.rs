//! The booking state machine.
//!
//! Every operation takes the caller's locked [`ConversationState`] and moves it
//! to the next step. Calendar and store calls are awaited one after the other;
//! the order of the mutations decides which inconsistency a failure can leave
//! behind:
//!
//! * commit: free check, calendar event, then the local record. A failed
//!   insert is compensated by deleting the event again.
//! * cancel: calendar event first, then the local record. A failed event
//!   delete leaves both sides untouched.

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use clinicbot_common::error::GatewayError;
use clinicbot_common::models::{Booking, NewBooking, UserId};
use clinicbot_config::{ConfigValidationError, ContactConfig};
use clinicbot_db::{BookingRepository, DbError};
use clinicbot_gcal::CalendarGateway;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::state::ConversationState;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Invalid booking configuration: {0}")]
    Config(#[from] ConfigValidationError),
}

/// Accepted phone format: the country prefix followed by exactly `digits` digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactPolicy {
    pub country_prefix: String,
    pub digits: usize,
}

impl ContactPolicy {
    pub fn from_config(contact: &ContactConfig) -> Result<Self, FlowError> {
        contact.validate()?;
        Ok(Self {
            country_prefix: contact.country_prefix.clone(),
            digits: contact.digits,
        })
    }

    pub fn is_valid(&self, contact: &str) -> bool {
        contact
            .strip_prefix(self.country_prefix.as_str())
            .is_some_and(|rest| rest.len() == self.digits && rest.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Example shown to the user, e.g. `+7XXXXXXXXXX`.
    pub fn template(&self) -> String {
        format!("{}{}", self.country_prefix, "X".repeat(self.digits))
    }
}

impl Default for ContactPolicy {
    fn default() -> Self {
        Self {
            country_prefix: "+7".to_string(),
            digits: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateOutcome {
    /// Free slots in the future, ordered; the user now picks a time.
    Slots(Vec<DateTime<Tz>>),
    NoSlots,
    /// The calendar could not be queried; the flow was reset.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeOutcome {
    Accepted,
    /// Not a slot the clinic offers, or already in the past.
    InvalidSlot,
    /// No time menu is open, or the button belongs to another day's menu.
    NotExpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameOutcome {
    Accepted,
    Empty,
    NotExpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Booked {
        booking: Booking,
        html_link: Option<String>,
    },
    /// Phone format rejected; slot and name are kept.
    InvalidContact,
    /// The pre-check or the event creation failed; nothing was written and
    /// the user stays at the contact step.
    Unavailable,
    /// Somebody else got the slot first.
    SlotTaken,
    /// The store refused the booking and the calendar event was removed again.
    RolledBack,
    /// The store refused the booking and the calendar event could not be
    /// removed either. The event is orphaned.
    RollbackFailed { event_id: String },
    NotExpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled(Booking),
    /// Unknown id, or a booking of somebody else.
    NotFound,
    /// The booking could not be looked up.
    Unavailable,
    /// The calendar refused the delete; nothing changed.
    CalendarFailed,
    /// The calendar event is gone but the local record could not be deleted.
    Diverged(Booking),
}

/// Drives one user's booking conversation.
pub struct BookingFlow<R> {
    calendar: CalendarGateway,
    repository: Arc<R>,
    contact: ContactPolicy,
    horizon_days: u32,
    /// Held from the free check until the event exists, so two commits for
    /// the same slot cannot both see it free.
    commit_guard: Mutex<()>,
}

impl<R: BookingRepository> BookingFlow<R> {
    pub fn new(
        calendar: CalendarGateway,
        repository: Arc<R>,
        contact: ContactPolicy,
        horizon_days: u32,
    ) -> Self {
        Self {
            calendar,
            repository,
            contact,
            horizon_days,
            commit_guard: Mutex::new(()),
        }
    }

    pub fn contact_policy(&self) -> &ContactPolicy {
        &self.contact
    }

    pub fn time_zone(&self) -> Tz {
        self.calendar.time_zone()
    }

    /// Days offered in the date menu: today and the following days up to the
    /// horizon, without the closed weekday.
    pub fn available_dates(&self, now: DateTime<Utc>) -> Vec<NaiveDate> {
        let hours = self.calendar.hours();
        let today = hours.today(now);
        (0..u64::from(self.horizon_days))
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .filter(|day| hours.is_open_on(*day))
            .collect()
    }

    /// The explicit "book" trigger. Supersedes whatever was in progress.
    pub fn start_booking(&self, state: &mut ConversationState, now: DateTime<Utc>) -> Vec<NaiveDate> {
        *state = ConversationState::AwaitingDate;
        self.available_dates(now)
    }

    #[instrument(skip(self, state))]
    pub async fn choose_date(
        &self,
        state: &mut ConversationState,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> DateOutcome {
        let slots = match self.calendar.free_slots(date).await {
            Ok(slots) => slots,
            Err(e) => {
                warn!(error = %e, "could not load free slots");
                state.reset();
                return DateOutcome::Unavailable;
            }
        };

        let upcoming: Vec<_> = slots.into_iter().filter(|slot| *slot > now).collect();
        if upcoming.is_empty() {
            state.reset();
            return DateOutcome::NoSlots;
        }

        *state = ConversationState::AwaitingTime { date };
        DateOutcome::Slots(upcoming)
    }

    pub fn choose_time(
        &self,
        state: &mut ConversationState,
        slot: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> TimeOutcome {
        let ConversationState::AwaitingTime { date } = *state else {
            debug!(%slot, step = %state.step(), "time selection outside the time menu");
            return TimeOutcome::NotExpected;
        };
        let hours = self.calendar.hours();
        if slot <= now || !hours.is_slot_start(slot) {
            debug!(%slot, "rejected time selection");
            return TimeOutcome::InvalidSlot;
        }
        if slot.with_timezone(&hours.time_zone).date_naive() != date {
            debug!(%slot, %date, "time selection from a stale menu");
            return TimeOutcome::NotExpected;
        }
        *state = ConversationState::AwaitingName { slot };
        TimeOutcome::Accepted
    }

    pub fn enter_name(&self, state: &mut ConversationState, text: &str) -> NameOutcome {
        let ConversationState::AwaitingName { slot } = *state else {
            return NameOutcome::NotExpected;
        };
        let name = text.trim();
        if name.is_empty() {
            return NameOutcome::Empty;
        }
        *state = ConversationState::AwaitingContact {
            slot,
            name: name.to_string(),
        };
        NameOutcome::Accepted
    }

    /// Validates the phone number and, if it passes, commits the booking.
    #[instrument(skip(self, state, user, contact), fields(user_id = %user))]
    pub async fn enter_contact(
        &self,
        state: &mut ConversationState,
        user: UserId,
        contact: &str,
    ) -> CommitOutcome {
        let ConversationState::AwaitingContact { slot, name } = state.clone() else {
            return CommitOutcome::NotExpected;
        };
        let contact = contact.trim();
        if !self.contact.is_valid(contact) {
            return CommitOutcome::InvalidContact;
        }

        let (start, end) = CalendarGateway::slot_window(slot);
        let created = {
            let _guard = self.commit_guard.lock().await;

            match self.calendar.is_free(start, end).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(%slot, "slot taken before commit");
                    state.reset();
                    return CommitOutcome::SlotTaken;
                }
                Err(e) => {
                    warn!(error = %e, "free/busy check failed");
                    return CommitOutcome::Unavailable;
                }
            }

            let summary = format!("Appointment: {name}");
            let description = format!("Appointment booked by {name}.\nContact: {contact}");
            match self.calendar.create_event(&summary, &description, start, end).await {
                Ok(created) => created,
                Err(e) => {
                    warn!(error = %e, "calendar event creation failed");
                    return CommitOutcome::Unavailable;
                }
            }
        };

        state.reset();
        let event_id = created.event_id;
        let new_booking = NewBooking {
            user_id: Some(user),
            name,
            contact: contact.to_string(),
            appointment_at: slot,
            event_id: Some(event_id.clone()),
        };

        match self.repository.create(new_booking).await {
            Ok(booking) => {
                info!(booking_id = booking.id, %event_id, "booking committed");
                CommitOutcome::Booked {
                    booking,
                    html_link: created.html_link,
                }
            }
            Err(e) => {
                error!(error = %e, %event_id, "storing booking failed, rolling back calendar event");
                self.roll_back(event_id).await
            }
        }
    }

    async fn roll_back(&self, event_id: String) -> CommitOutcome {
        match self.calendar.delete_event(&event_id).await {
            Ok(()) | Err(GatewayError::NotFound(_)) => {
                info!(%event_id, "calendar event rolled back");
                CommitOutcome::RolledBack
            }
            Err(e) => {
                error!(error = %e, %event_id, "CRITICAL: orphaned calendar event, rollback failed");
                CommitOutcome::RollbackFailed { event_id }
            }
        }
    }

    /// Cancels booking `id` of `user`: calendar event first, then the record.
    #[instrument(skip(self, state, user), fields(user_id = %user))]
    pub async fn cancel(&self, state: &mut ConversationState, user: UserId, id: i64) -> CancelOutcome {
        let booking = match self.repository.get_by_id(id).await {
            Ok(booking) if booking.is_owned_by(user) => booking,
            Ok(_) => {
                warn!(booking_id = id, "cancel attempt on a foreign booking");
                return CancelOutcome::NotFound;
            }
            Err(DbError::NotFound(_)) => return CancelOutcome::NotFound,
            Err(e) => {
                warn!(booking_id = id, error = %e, "booking lookup failed");
                return CancelOutcome::Unavailable;
            }
        };

        if let Some(event_id) = booking.event_id.as_deref() {
            match self.calendar.delete_event(event_id).await {
                Ok(()) => {}
                Err(GatewayError::NotFound(_)) => {
                    info!(booking_id = id, event_id, "calendar event already gone");
                }
                Err(e) => {
                    warn!(booking_id = id, event_id, error = %e, "calendar delete failed, keeping booking");
                    return CancelOutcome::CalendarFailed;
                }
            }
        }

        match self.repository.delete_by_id(id).await {
            Ok(()) | Err(DbError::NotFound(_)) => {
                info!(booking_id = id, "booking cancelled");
                state.reset();
                CancelOutcome::Cancelled(booking)
            }
            Err(e) => {
                error!(booking_id = id, error = %e, "CRITICAL: calendar event deleted but booking record remains");
                CancelOutcome::Diverged(booking)
            }
        }
    }

    pub async fn bookings_of(&self, user: UserId) -> Result<Vec<Booking>, DbError> {
        self.repository.list_by_owner(user).await
    }
}
