// --- File: crates/clinicbot_gcal/src/service.rs ---
//! Google Calendar implementation of [`CalendarService`].

use chrono::{DateTime, Utc};
use clinicbot_common::error::GatewayError;
use clinicbot_common::services::{
    BoxFuture, CalendarEvent, CalendarEventResult, CalendarService,
};
use google_calendar3::api::{Event, EventDateTime, FreeBusyRequest, FreeBusyRequestItem};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::HubType;

/// Errors that can occur when interacting with Google Calendar.
#[derive(Error, Debug)]
pub enum GcalServiceError {
    #[error("Google API Error: {0}")]
    ApiError(#[from] google_calendar3::Error),
    #[error("Google API returned an event without id")]
    MissingEventId,
    #[error("Event {0} is already cancelled")]
    AlreadyCancelled(String),
}

impl From<GcalServiceError> for GatewayError {
    fn from(err: GcalServiceError) -> Self {
        use google_calendar3::Error as ApiError;

        let message = err.to_string();
        match &err {
            GcalServiceError::ApiError(api) => match api {
                ApiError::Failure(response) => from_status(response.status().as_u16(), message),
                ApiError::BadRequest(body) => {
                    let code = body
                        .pointer("/error/code")
                        .and_then(serde_json::Value::as_u64)
                        .unwrap_or(400);
                    from_status(code as u16, message)
                }
                ApiError::HttpError(_)
                | ApiError::Io(_)
                | ApiError::Cancelled
                | ApiError::MissingToken(_) => GatewayError::Unavailable(message),
                _ => GatewayError::Rejected(message),
            },
            GcalServiceError::MissingEventId => GatewayError::Rejected(message),
            GcalServiceError::AlreadyCancelled(_) => GatewayError::NotFound(message),
        }
    }
}

/// Maps an HTTP status of the Calendar API onto the gateway taxonomy.
pub fn from_status(status: u16, message: String) -> GatewayError {
    match status {
        404 | 410 => GatewayError::NotFound(message),
        408 | 429 | 500..=599 => GatewayError::Unavailable(message),
        _ => GatewayError::Rejected(message),
    }
}

/// Google Calendar service implementation.
pub struct GoogleCalendarService {
    calendar_hub: Arc<HubType>,
}

impl GoogleCalendarService {
    pub fn new(calendar_hub: Arc<HubType>) -> Self {
        Self { calendar_hub }
    }
}

impl CalendarService for GoogleCalendarService {
    /// Busy periods from the free/busy endpoint, sorted by start.
    fn get_busy_times(
        &self,
        calendar_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<(DateTime<Utc>, DateTime<Utc>)>, GatewayError> {
        let calendar_id = calendar_id.to_string();
        let calendar_hub = self.calendar_hub.clone();

        Box::pin(async move {
            let req = FreeBusyRequest {
                time_min: Some(start_time),
                time_max: Some(end_time),
                time_zone: Some("UTC".to_string()),
                items: Some(vec![FreeBusyRequestItem {
                    id: Some(calendar_id.clone()),
                    ..Default::default()
                }]),
                ..Default::default()
            };

            let (_response, freebusy_response) = calendar_hub
                .freebusy()
                .query(req)
                .doit()
                .await
                .map_err(GcalServiceError::from)?;

            let mut busy_periods = Vec::new();
            if let Some(cal_info) = freebusy_response
                .calendars
                .as_ref()
                .and_then(|calendars| calendars.get(&calendar_id))
            {
                if let Some(errors) = cal_info.errors.as_ref().filter(|e| !e.is_empty()) {
                    // The API reports per-calendar problems (notFound, internalError) here
                    // instead of failing the request.
                    let reason = errors
                        .iter()
                        .filter_map(|e| e.reason.clone())
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(if reason.contains("notFound") {
                        GatewayError::Rejected(format!("calendar {calendar_id} not found"))
                    } else {
                        GatewayError::Unavailable(format!("free/busy failed: {reason}"))
                    });
                }
                for period in cal_info.busy.iter().flatten() {
                    match (period.start, period.end) {
                        (Some(start_dt), Some(end_dt)) => busy_periods.push((start_dt, end_dt)),
                        _ => warn!(?period, "skipping busy period with missing start/end"),
                    }
                }
            }
            busy_periods.sort_by_key(|k| k.0);
            debug!(calendar_id = %calendar_id, count = busy_periods.len(), "busy periods fetched");
            Ok(busy_periods)
        })
    }

    fn create_event(
        &self,
        calendar_id: &str,
        event: CalendarEvent,
    ) -> BoxFuture<'_, CalendarEventResult, GatewayError> {
        let calendar_id = calendar_id.to_string();
        let calendar_hub = self.calendar_hub.clone();

        Box::pin(async move {
            let new_event = Event {
                summary: Some(event.summary),
                description: event.description,
                start: Some(EventDateTime {
                    date_time: Some(event.start_time),
                    time_zone: Some(event.time_zone.clone()),
                    ..Default::default()
                }),
                end: Some(EventDateTime {
                    date_time: Some(event.end_time),
                    time_zone: Some(event.time_zone),
                    ..Default::default()
                }),
                ..Default::default()
            };

            let (_response, created_event) = calendar_hub
                .events()
                .insert(new_event, &calendar_id)
                .doit()
                .await
                .map_err(GcalServiceError::from)?;

            let event_id = created_event.id.ok_or(GcalServiceError::MissingEventId)?;
            Ok(CalendarEventResult {
                event_id,
                html_link: created_event.html_link,
            })
        })
    }

    /// Deletes an event without notifying attendees.
    ///
    /// Google keeps deleted events around with status "cancelled"; such an
    /// event is reported as `NotFound`, like one that never existed.
    fn delete_event(&self, calendar_id: &str, event_id: &str) -> BoxFuture<'_, (), GatewayError> {
        let calendar_id = calendar_id.to_string();
        let event_id = event_id.to_string();
        let calendar_hub = self.calendar_hub.clone();

        Box::pin(async move {
            let (_response, event) = calendar_hub
                .events()
                .get(&calendar_id, &event_id)
                .doit()
                .await
                .map_err(GcalServiceError::from)?;

            if event.status.as_deref() == Some("cancelled") {
                return Err(GcalServiceError::AlreadyCancelled(event_id).into());
            }

            calendar_hub
                .events()
                .delete(&calendar_id, &event_id)
                .send_updates("none")
                .doit()
                .await
                .map_err(GcalServiceError::from)?;
            debug!(event_id = %event_id, "event deleted");
            Ok(())
        })
    }
}
