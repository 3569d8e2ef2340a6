//! In-memory stand-ins for the calendar, the booking store and the chat
//! transport, with switches to make individual calls fail.

use chrono::{DateTime, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Europe::Moscow;
use clinicbot_common::error::{GatewayError, TransportError};
use clinicbot_common::models::{Booking, ChatId, NewBooking, OutgoingMessage, UserId};
use clinicbot_common::services::{
    BoxFuture, CalendarEvent, CalendarEventResult, CalendarService, ChatTransport,
};
use clinicbot_db::{BookingRepository, DbError};
use clinicbot_gcal::{CalendarGateway, WorkingHours};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::flow::{BookingFlow, ContactPolicy};

#[derive(Default)]
pub struct FakeCalendar {
    pub events: Mutex<Vec<(String, CalendarEvent)>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_busy: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    next_id: AtomicI64,
}

impl FakeCalendar {
    pub fn add_busy(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        let id = format!("busy-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.events.lock().unwrap().push((
            id.clone(),
            CalendarEvent {
                start_time: start,
                end_time: end,
                summary: "busy".into(),
                description: None,
                time_zone: "Europe/Moscow".into(),
            },
        ));
        id
    }

    pub fn event(&self, id: &str) -> Option<CalendarEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(event_id, _)| event_id == id)
            .map(|(_, event)| event.clone())
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl CalendarService for FakeCalendar {
    fn get_busy_times(
        &self,
        _calendar_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<(DateTime<Utc>, DateTime<Utc>)>, GatewayError> {
        Box::pin(async move {
            // Let a concurrent commit interleave here if it can.
            tokio::task::yield_now().await;
            if self.fail_busy.load(Ordering::SeqCst) {
                return Err(GatewayError::Unavailable("freebusy timeout".into()));
            }
            let mut busy: Vec<_> = self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, e)| e.start_time < end_time && e.end_time > start_time)
                .map(|(_, e)| (e.start_time, e.end_time))
                .collect();
            busy.sort();
            Ok(busy)
        })
    }

    fn create_event(
        &self,
        _calendar_id: &str,
        event: CalendarEvent,
    ) -> BoxFuture<'_, CalendarEventResult, GatewayError> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(GatewayError::Rejected("quota exceeded".into()));
            }
            let id = format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            self.events.lock().unwrap().push((id.clone(), event));
            Ok(CalendarEventResult {
                html_link: Some(format!("https://calendar.example/{id}")),
                event_id: id,
            })
        })
    }

    fn delete_event(&self, _calendar_id: &str, event_id: &str) -> BoxFuture<'_, (), GatewayError> {
        let event_id = event_id.to_string();
        Box::pin(async move {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(GatewayError::Unavailable("connection reset".into()));
            }
            let mut events = self.events.lock().unwrap();
            let before = events.len();
            events.retain(|(id, _)| *id != event_id);
            if events.len() == before {
                return Err(GatewayError::NotFound(event_id));
            }
            self.deleted.lock().unwrap().push(event_id);
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct FakeRepository {
    pub rows: Mutex<BTreeMap<i64, Booking>>,
    pub fail_create: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_delete: AtomicBool,
    next_id: AtomicI64,
}

impl FakeRepository {
    pub fn insert(&self, booking: NewBooking) -> Booking {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let booking = booking.into_booking(id);
        self.rows.lock().unwrap().insert(id, booking.clone());
        booking
    }

    pub fn contains(&self, id: i64) -> bool {
        self.rows.lock().unwrap().contains_key(&id)
    }

    pub fn all(&self) -> Vec<Booking> {
        self.rows.lock().unwrap().values().cloned().collect()
    }
}

impl BookingRepository for FakeRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn create(&self, booking: NewBooking) -> Result<Booking, DbError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(DbError::QueryError("disk I/O error".into()));
        }
        Ok(self.insert(booking))
    }

    async fn get_by_id(&self, id: i64) -> Result<Booking, DbError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(DbError::PoolError("pool timed out".into()));
        }
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(DbError::NotFound(id))
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), DbError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(DbError::QueryError("database is locked".into()));
        }
        self.rows
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(DbError::NotFound(id))
    }

    async fn list_by_owner(&self, user_id: UserId) -> Result<Vec<Booking>, DbError> {
        let mut mine: Vec<_> = self
            .all()
            .into_iter()
            .filter(|b| b.is_owned_by(user_id))
            .collect();
        mine.sort_by_key(|b| (b.appointment_at, b.id));
        Ok(mine)
    }

    async fn list_all(&self) -> Result<Vec<Booking>, DbError> {
        Ok(self.all())
    }

    async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, DbError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|b| b.user_id.is_some() && b.appointment_at >= from && b.appointment_at < to)
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(ChatId, OutgoingMessage)>>,
    pub acks: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl RecordingTransport {
    pub fn texts_to(&self, chat: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == chat)
            .map(|(_, m)| m.text.clone())
            .collect()
    }

    pub fn last_to(&self, chat: ChatId) -> Option<OutgoingMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| *to == chat)
            .map(|(_, m)| m.clone())
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl ChatTransport for RecordingTransport {
    fn send(&self, chat: ChatId, message: OutgoingMessage) -> BoxFuture<'_, (), TransportError> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError("bot was blocked by the user".into()));
            }
            self.sent.lock().unwrap().push((chat, message));
            Ok(())
        })
    }

    fn answer_callback(&self, callback_id: &str) -> BoxFuture<'_, (), TransportError> {
        let callback_id = callback_id.to_string();
        Box::pin(async move {
            self.acks.lock().unwrap().push(callback_id);
            Ok(())
        })
    }
}

/// Moscow clinic, 9 to 18, closed on Sundays.
pub fn hours() -> WorkingHours {
    WorkingHours {
        time_zone: Moscow,
        start_hour: 9,
        end_hour: 18,
        closed_weekday: Some(Weekday::Sun),
    }
}

/// Sunday 2025-03-02, 09:00 in Moscow.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 2, 6, 0, 0).unwrap()
}

pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

/// `hour:00` on Monday 2025-03-03, Moscow time.
pub fn monday_at(hour: u32) -> DateTime<Utc> {
    Moscow
        .with_ymd_and_hms(2025, 3, 3, hour, 0, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub struct Harness {
    pub calendar: Arc<FakeCalendar>,
    pub repository: Arc<FakeRepository>,
    pub flow: BookingFlow<FakeRepository>,
}

pub fn harness() -> Harness {
    let calendar = Arc::new(FakeCalendar::default());
    let repository = Arc::new(FakeRepository::default());
    let gateway = CalendarGateway::new(calendar.clone(), "clinic@example.com", hours());
    let flow = BookingFlow::new(gateway, repository.clone(), ContactPolicy::default(), 7);
    Harness {
        calendar,
        repository,
        flow,
    }
}

pub fn new_booking(user: i64, hour: u32, event_id: Option<&str>) -> NewBooking {
    NewBooking {
        user_id: Some(UserId(user)),
        name: "Anna Petrova".into(),
        contact: "+79990001122".into(),
        appointment_at: monday_at(hour),
        event_id: event_id.map(str::to_string),
    }
}
