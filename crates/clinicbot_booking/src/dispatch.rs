//! Routes inbound chat events to the booking flow and sends the replies.
//!
//! The dispatcher holds the user's conversation lock for the whole handling of
//! one event, replies included, so events of one user are processed strictly
//! one after the other while different users proceed in parallel.

use chrono::{DateTime, NaiveDate, Utc};
use clinicbot_common::models::{Booking, ChatId, OutgoingMessage, UserId};
use clinicbot_common::services::ChatTransport;
use clinicbot_db::BookingRepository;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::flow::{BookingFlow, CancelOutcome, CommitOutcome, DateOutcome, NameOutcome, TimeOutcome};
use crate::presenter::Presenter;
use crate::state::{ConversationState, ConversationStore, Step};

pub const BOOK: &str = "book";
pub const MY_BOOKINGS: &str = "my_bookings";
pub const DATE_PREFIX: &str = "date_";
pub const TIME_PREFIX: &str = "time_";
pub const CANCEL_PREFIX: &str = "cancel_";

/// A slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Unknown(String),
}

impl Command {
    /// Parses `/name`, `/name@bot` or `/name args`. `None` if `text` is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word
            .split_once('@')
            .map_or(word, |(name, _)| name)
            .to_ascii_lowercase();
        Some(match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            _ => Command::Unknown(name),
        })
    }
}

/// Everything the bot can receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command(Command),
    Callback { id: String, payload: String },
    Text(String),
}

impl Inbound {
    /// A text message, which may turn out to be a command.
    pub fn from_text(text: &str) -> Self {
        match Command::parse(text) {
            Some(command) => Inbound::Command(command),
            None => Inbound::Text(text.to_string()),
        }
    }
}

/// Decoded button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Book,
    MyBookings,
    Date(NaiveDate),
    InvalidDate,
    Time(DateTime<Utc>),
    InvalidTime,
    Cancel(i64),
    InvalidBookingId,
    Unknown,
}

impl CallbackAction {
    /// Prefix match in a fixed order; the first match wins.
    pub fn parse(payload: &str) -> Self {
        if payload == BOOK {
            return CallbackAction::Book;
        }
        if payload == MY_BOOKINGS {
            return CallbackAction::MyBookings;
        }
        if let Some(raw) = payload.strip_prefix(DATE_PREFIX) {
            return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_or(CallbackAction::InvalidDate, CallbackAction::Date);
        }
        if let Some(raw) = payload.strip_prefix(TIME_PREFIX) {
            return DateTime::parse_from_rfc3339(raw).map_or(CallbackAction::InvalidTime, |t| {
                CallbackAction::Time(t.with_timezone(&Utc))
            });
        }
        if let Some(raw) = payload.strip_prefix(CANCEL_PREFIX) {
            return raw
                .parse()
                .map_or(CallbackAction::InvalidBookingId, CallbackAction::Cancel);
        }
        CallbackAction::Unknown
    }
}

/// Parses the configured admin chat. A malformed value only disables the notice.
pub fn parse_admin_chat(raw: Option<&str>) -> Option<ChatId> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    match raw.parse::<i64>() {
        Ok(id) => Some(ChatId(id)),
        Err(e) => {
            warn!(admin_id = raw, error = %e, "admin id is not a chat id, notification skipped");
            None
        }
    }
}

pub type Clock = fn() -> DateTime<Utc>;

pub struct ChatDispatcher<R> {
    flow: BookingFlow<R>,
    conversations: ConversationStore,
    transport: Arc<dyn ChatTransport>,
    presenter: Presenter,
    admin_id: Option<String>,
    clock: Clock,
}

impl<R: BookingRepository> ChatDispatcher<R> {
    pub fn new(flow: BookingFlow<R>, transport: Arc<dyn ChatTransport>, admin_id: Option<String>) -> Self {
        let presenter = Presenter::new(flow.time_zone(), flow.contact_policy().clone());
        Self {
            flow,
            conversations: ConversationStore::new(),
            transport,
            presenter,
            admin_id,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    #[instrument(skip(self, user, chat, inbound), fields(user_id = %user, chat_id = %chat))]
    pub async fn handle(&self, user: UserId, chat: ChatId, inbound: Inbound) {
        let mut state = self.conversations.lock(user).await;
        let before = state.step();

        let replies = match inbound {
            Inbound::Command(Command::Start | Command::Help) => {
                state.reset();
                vec![self.presenter.main_menu()]
            }
            Inbound::Command(Command::Unknown(name)) => {
                debug!(command = %name, "unknown command");
                vec![self.presenter.unknown_command()]
            }
            Inbound::Callback { id, payload } => {
                if let Err(e) = self.transport.answer_callback(&id).await {
                    warn!(error = %e, "could not acknowledge callback");
                }
                self.on_callback(&mut state, user, &payload).await
            }
            Inbound::Text(text) => self.on_text(&mut state, user, chat, &text).await,
        };

        let after = state.step();
        if before != after {
            debug!(from = %before, to = %after, "conversation step changed");
        }
        for reply in replies {
            self.deliver(chat, reply).await;
        }
    }

    async fn on_callback(
        &self,
        state: &mut ConversationState,
        user: UserId,
        payload: &str,
    ) -> Vec<OutgoingMessage> {
        let now = (self.clock)();
        match CallbackAction::parse(payload) {
            CallbackAction::Book => {
                let dates = self.flow.start_booking(state, now);
                vec![self.presenter.date_menu(&dates)]
            }
            CallbackAction::MyBookings => match self.flow.bookings_of(user).await {
                Ok(bookings) => self.presenter.booking_list(&bookings),
                Err(e) => {
                    error!(error = %e, "could not list bookings");
                    vec![self.presenter.bookings_unavailable()]
                }
            },
            CallbackAction::Date(date) => match self.flow.choose_date(state, date, now).await {
                DateOutcome::Slots(slots) => vec![self.presenter.time_menu(&slots)],
                DateOutcome::NoSlots => vec![self.presenter.no_slots()],
                DateOutcome::Unavailable => vec![self.presenter.slots_unavailable()],
            },
            CallbackAction::InvalidDate => vec![self.presenter.invalid_date()],
            CallbackAction::Time(slot) => match self.flow.choose_time(state, slot, now) {
                TimeOutcome::Accepted => vec![self.presenter.ask_name()],
                TimeOutcome::InvalidSlot => vec![self.presenter.invalid_time()],
                TimeOutcome::NotExpected => vec![self.presenter.stale_menu()],
            },
            CallbackAction::InvalidTime => vec![self.presenter.invalid_time()],
            CallbackAction::Cancel(id) => {
                let reply = match self.flow.cancel(state, user, id).await {
                    CancelOutcome::Cancelled(_) => self.presenter.cancelled(),
                    CancelOutcome::NotFound => self.presenter.booking_not_found(),
                    CancelOutcome::Unavailable => self.presenter.try_again(),
                    CancelOutcome::CalendarFailed => self.presenter.cancel_calendar_failed(),
                    CancelOutcome::Diverged(_) => self.presenter.cancel_diverged(),
                };
                vec![reply]
            }
            CallbackAction::InvalidBookingId => vec![self.presenter.invalid_booking_id()],
            CallbackAction::Unknown => {
                debug!(payload, "unknown callback payload");
                vec![self.presenter.unknown_action()]
            }
        }
    }

    async fn on_text(
        &self,
        state: &mut ConversationState,
        user: UserId,
        chat: ChatId,
        text: &str,
    ) -> Vec<OutgoingMessage> {
        match state.step() {
            Step::AwaitingName => match self.flow.enter_name(state, text) {
                NameOutcome::Accepted => vec![self.presenter.ask_contact()],
                NameOutcome::Empty => vec![self.presenter.ask_name()],
                NameOutcome::NotExpected => vec![self.presenter.use_buttons()],
            },
            Step::AwaitingContact => match self.flow.enter_contact(state, user, text).await {
                CommitOutcome::Booked { booking, html_link } => {
                    self.deliver(chat, self.presenter.booked(&booking, html_link.as_deref()))
                        .await;
                    self.notify_admin(&booking, user).await;
                    Vec::new()
                }
                CommitOutcome::InvalidContact => vec![self.presenter.invalid_contact()],
                CommitOutcome::Unavailable => vec![self.presenter.try_again()],
                CommitOutcome::SlotTaken => vec![self.presenter.slot_taken()],
                CommitOutcome::RolledBack => vec![self.presenter.rolled_back()],
                CommitOutcome::RollbackFailed { .. } => vec![self.presenter.contact_admin()],
                CommitOutcome::NotExpected => vec![self.presenter.use_buttons()],
            },
            _ => vec![self.presenter.use_buttons()],
        }
    }

    async fn notify_admin(&self, booking: &Booking, user: UserId) {
        let Some(admin) = parse_admin_chat(self.admin_id.as_deref()) else {
            return;
        };
        match self.transport.send(admin, self.presenter.admin_notice(booking, user)).await {
            Ok(()) => info!(booking_id = booking.id, "admin notified"),
            Err(e) => warn!(booking_id = booking.id, error = %e, "admin notification failed"),
        }
    }

    async fn deliver(&self, chat: ChatId, message: OutgoingMessage) {
        if let Err(e) = self.transport.send(chat, message).await {
            warn!(error = %e, "could not deliver reply");
        }
    }
}
