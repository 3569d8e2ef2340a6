// --- File: crates/clinicbot_gcal/src/logic.rs ---
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use clinicbot_common::error::GatewayError;
use clinicbot_common::models::slot_duration;
use clinicbot_common::services::{CalendarEvent, CalendarEventResult, CalendarService};
use clinicbot_config::{ConfigValidationError, ScheduleConfig};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum GcalError {
    #[error("Schedule configuration error: {0}")]
    Config(#[from] ConfigValidationError),
}

/// The clinic's opening hours.
///
/// Slots start on every whole hour from `start_hour` up to, but not including,
/// `end_hour`: the last appointment ends exactly when the clinic closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingHours {
    pub time_zone: Tz,
    pub start_hour: u32,
    pub end_hour: u32,
    pub closed_weekday: Option<Weekday>,
}

impl WorkingHours {
    pub fn from_config(schedule: &ScheduleConfig) -> Result<Self, GcalError> {
        let hours = Self {
            time_zone: schedule.tz()?,
            start_hour: schedule.work_start_hour,
            end_hour: schedule.work_end_hour,
            closed_weekday: schedule.closed_day()?,
        };
        if hours.start_hour >= hours.end_hour || hours.end_hour > 24 {
            return Err(ConfigValidationError::InvalidWorkHours {
                start: hours.start_hour,
                end: hours.end_hour,
            }
            .into());
        }
        Ok(hours)
    }

    pub fn is_open_on(&self, day: NaiveDate) -> bool {
        self.closed_weekday != Some(day.weekday())
    }

    /// Every candidate slot of `day`, before looking at the calendar.
    ///
    /// Hours that do not exist locally (DST gap) are skipped; an ambiguous
    /// hour resolves to its first occurrence.
    pub fn slot_starts(&self, day: NaiveDate) -> Vec<DateTime<Tz>> {
        if !self.is_open_on(day) {
            return Vec::new();
        }
        (self.start_hour..self.end_hour)
            .filter_map(|hour| day.and_hms_opt(hour, 0, 0))
            .filter_map(|naive| self.time_zone.from_local_datetime(&naive).earliest())
            .collect()
    }

    /// True if `instant` is one of the slots [`Self::slot_starts`] would offer.
    pub fn is_slot_start(&self, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&self.time_zone);
        local.minute() == 0
            && local.second() == 0
            && local.nanosecond() == 0
            && self.slot_starts(local.date_naive()).contains(&local)
    }

    /// Today's date on the clinic's wall clock.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.time_zone).date_naive()
    }
}

/// Start of `day` in `tz`, i.e. local midnight.
///
/// A few zones skip midnight on DST days; the first existing hour is used then.
pub fn local_day_start(day: NaiveDate, tz: Tz) -> DateTime<Tz> {
    (0..24)
        .filter_map(|hour| day.and_hms_opt(hour, 0, 0))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&day.and_time(NaiveTime::MIN)))
}

/// The UTC window covering `day` from local midnight to the next local midnight.
pub fn day_window(day: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_day_start(day, tz).with_timezone(&Utc);
    let end = day
        .succ_opt()
        .map(|next| local_day_start(next, tz).with_timezone(&Utc))
        .unwrap_or(start + chrono::Duration::days(1));
    (start, end)
}

/// Drops every candidate that lies strictly inside a busy period or exactly on
/// its start. A candidate equal to a busy period's end stays free.
pub fn calculate_free_slots(
    candidates: &[DateTime<Tz>],
    busy_periods: &[(DateTime<Utc>, DateTime<Utc>)],
) -> Vec<DateTime<Tz>> {
    candidates
        .iter()
        .filter(|slot| {
            let instant = slot.with_timezone(&Utc);
            !busy_periods
                .iter()
                .any(|(start, end)| instant == *start || (instant > *start && instant < *end))
        })
        .copied()
        .collect()
}

/// True if any busy period overlaps `[start, end)`.
pub fn overlaps_any(
    busy_periods: &[(DateTime<Utc>, DateTime<Utc>)],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    busy_periods.iter().any(|(s, e)| *s < end && *e > start)
}

/// Narrow calendar facade used by the booking flow.
///
/// Binds a [`CalendarService`] to one calendar and one set of working hours.
#[derive(Clone)]
pub struct CalendarGateway {
    service: Arc<dyn CalendarService>,
    calendar_id: String,
    hours: WorkingHours,
}

impl CalendarGateway {
    pub fn new(
        service: Arc<dyn CalendarService>,
        calendar_id: impl Into<String>,
        hours: WorkingHours,
    ) -> Self {
        Self {
            service,
            calendar_id: calendar_id.into(),
            hours,
        }
    }

    pub fn hours(&self) -> &WorkingHours {
        &self.hours
    }

    pub fn time_zone(&self) -> Tz {
        self.hours.time_zone
    }

    /// Free slots of `day`, ordered. A closed day returns no slots without
    /// asking the backend.
    #[instrument(skip(self), fields(calendar_id = %self.calendar_id))]
    pub async fn free_slots(&self, day: NaiveDate) -> Result<Vec<DateTime<Tz>>, GatewayError> {
        let candidates = self.hours.slot_starts(day);
        if candidates.is_empty() {
            debug!("no working hours on this day");
            return Ok(candidates);
        }

        let (start, end) = day_window(day, self.hours.time_zone);
        let busy = self
            .service
            .get_busy_times(&self.calendar_id, start, end)
            .await?;
        let free = calculate_free_slots(&candidates, &busy);
        debug!(busy = busy.len(), free = free.len(), "slots computed");
        Ok(free)
    }

    /// True iff nothing in the calendar overlaps `[start, end)`.
    pub async fn is_free(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, GatewayError> {
        let busy = self
            .service
            .get_busy_times(&self.calendar_id, start, end)
            .await?;
        Ok(!overlaps_any(&busy, start, end))
    }

    /// Creates an event spanning `[start, end)` displayed in the clinic zone.
    pub async fn create_event(
        &self,
        summary: &str,
        description: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CalendarEventResult, GatewayError> {
        let event = CalendarEvent {
            start_time: start,
            end_time: end,
            summary: summary.to_string(),
            description: Some(description.to_string()),
            time_zone: self.hours.time_zone.name().to_string(),
        };
        self.service.create_event(&self.calendar_id, event).await
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<(), GatewayError> {
        self.service.delete_event(&self.calendar_id, event_id).await
    }

    /// `[start, start + 1h)`, the window of the appointment starting at `start`.
    pub fn slot_window(start: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (start, start + slot_duration())
    }
}
