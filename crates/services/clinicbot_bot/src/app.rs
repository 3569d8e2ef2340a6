// --- File: crates/services/clinicbot_bot/src/app.rs ---
//! Wiring of configuration, calendar, store and booking flow.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clinicbot_booking::{BookingFlow, ChatDispatcher, ContactPolicy};
use clinicbot_common::error::{config_error, database_error, ClinicError};
use clinicbot_common::services::ChatTransport;
use clinicbot_config::{AppConfig, ConfigValidationError};
use clinicbot_db::{BookingRepository, DbClient, SqlBookingRepository};
use clinicbot_gcal::auth::create_calendar_hub;
use clinicbot_gcal::logic::day_window;
use clinicbot_gcal::{CalendarGateway, GoogleCalendarService, WorkingHours};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub type BookingDispatcher = ChatDispatcher<SqlBookingRepository>;

/// Connects to the booking store and makes sure the schema exists.
pub async fn open_repository(config: &AppConfig) -> Result<SqlBookingRepository, ClinicError> {
    let client = DbClient::from_config(&config.database)
        .await
        .map_err(database_error)?;
    if !client.is_healthy().await {
        return Err(database_error("booking store did not answer a health check"));
    }
    info!(backend = ?client.backend(), "booking store connected");

    let repository = SqlBookingRepository::new(client);
    repository.init_schema().await.map_err(database_error)?;
    Ok(repository)
}

/// Authenticates against Google Calendar and binds the clinic calendar.
pub async fn build_gateway(config: &AppConfig) -> Result<CalendarGateway, ClinicError> {
    let hours = WorkingHours::from_config(&config.schedule).map_err(config_error)?;
    let calendar_id = config
        .gcal
        .calendar_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| config_error(ConfigValidationError::MissingCalendarId))?;

    let hub = create_calendar_hub(&config.gcal)
        .await
        .map_err(|e| config_error(format!("Google Calendar authentication failed: {e}")))?;
    let service = GoogleCalendarService::new(Arc::new(hub));

    info!(
        %calendar_id,
        time_zone = %hours.time_zone,
        start = hours.start_hour,
        end = hours.end_hour,
        "calendar gateway ready"
    );
    Ok(CalendarGateway::new(Arc::new(service), calendar_id, hours))
}

pub fn build_dispatcher(
    config: &AppConfig,
    gateway: CalendarGateway,
    repository: SqlBookingRepository,
    transport: Arc<dyn ChatTransport>,
) -> Result<BookingDispatcher, ClinicError> {
    let contact = ContactPolicy::from_config(&config.contact).map_err(config_error)?;
    let flow = BookingFlow::new(
        gateway,
        Arc::new(repository),
        contact,
        config.schedule.booking_horizon_days,
    );
    Ok(ChatDispatcher::new(flow, transport, config.telegram.admin_id.clone()))
}

/// Periodically drops idle conversations so the state map does not grow forever.
pub fn spawn_conversation_pruner(dispatcher: Arc<BookingDispatcher>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let pruned = dispatcher.conversations().prune_idle();
            if pruned > 0 {
                debug!(pruned, "idle conversations dropped");
            }
        }
    });
}

/// `[start of today, start of today + days)` on the clinic's calendar.
pub fn report_window(now: DateTime<Utc>, time_zone: Tz, days: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.with_timezone(&time_zone).date_naive();
    let (from, _) = day_window(today, time_zone);
    let last = today
        .checked_add_days(chrono::Days::new(u64::from(days.max(1)) - 1))
        .unwrap_or(today);
    let (_, to) = day_window(last, time_zone);
    (from, to)
}
