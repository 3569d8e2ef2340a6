// --- File: crates/clinicbot_config/src/models.rs ---

use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Semantic problems found after the raw configuration was deserialized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("telegram.bot_token is empty")]
    MissingBotToken,
    #[error("gcal.calendar_id is missing")]
    MissingCalendarId,
    #[error("unknown time zone: {0}")]
    UnknownTimeZone(String),
    #[error("unknown weekday: {0}")]
    UnknownWeekday(String),
    #[error("invalid work hours {start}..{end}: expected 0 <= start < end <= 24")]
    InvalidWorkHours { start: u32, end: u32 },
    #[error("schedule.booking_horizon_days must be at least 1")]
    EmptyHorizon,
    #[error("contact.country_prefix must start with '+' followed by digits, got {0:?}")]
    InvalidCountryPrefix(String),
    #[error("contact.digits must be between 1 and 15")]
    InvalidDigitCount,
}

// --- Telegram Config ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramConfig {
    /// Bot API token. Use "secret_from_env" to read it from CLINICBOT_SECRET_TELEGRAM_BOT_TOKEN.
    #[serde(default)]
    pub bot_token: String,
    /// Chat that receives a copy of every committed booking. Kept raw so a
    /// malformed value only disables the notification.
    #[serde(default)]
    pub admin_id: Option<String>,
}

// --- Database Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. sqlite:data/clinicbot.db, loaded via CLINICBOT__DATABASE__URL or DATABASE_URL
    #[serde(default)]
    pub max_connections: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/clinicbot.db".to_string(),
            max_connections: None,
        }
    }
}

// --- Google Calendar Config ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct GcalConfig {
    pub key_path: Option<String>,    // service account json, GOOGLE_CREDENTIALS_FILE
    pub calendar_id: Option<String>, // CALENDAR_ID
}

// --- Schedule Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_work_start_hour")]
    pub work_start_hour: u32,
    #[serde(default = "default_work_end_hour")]
    pub work_end_hour: u32,
    /// Weekday the clinic is closed ("Sun", "sunday", ...). Empty string means open every day.
    #[serde(default = "default_closed_weekday")]
    pub closed_weekday: Option<String>,
    #[serde(default = "default_booking_horizon_days")]
    pub booking_horizon_days: u32,
}

fn default_time_zone() -> String {
    "Europe/Moscow".to_string()
}
fn default_work_start_hour() -> u32 {
    9
}
fn default_work_end_hour() -> u32 {
    18
}
fn default_closed_weekday() -> Option<String> {
    Some("Sun".to_string())
}
fn default_booking_horizon_days() -> u32 {
    7
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            work_start_hour: default_work_start_hour(),
            work_end_hour: default_work_end_hour(),
            closed_weekday: default_closed_weekday(),
            booking_horizon_days: default_booking_horizon_days(),
        }
    }
}

impl ScheduleConfig {
    pub fn tz(&self) -> Result<Tz, ConfigValidationError> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|_| ConfigValidationError::UnknownTimeZone(self.time_zone.clone()))
    }

    pub fn closed_day(&self) -> Result<Option<Weekday>, ConfigValidationError> {
        match self.closed_weekday.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<Weekday>()
                .map(Some)
                .map_err(|_| ConfigValidationError::UnknownWeekday(raw.to_string())),
        }
    }
}

// --- Contact validation Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContactConfig {
    #[serde(default = "default_country_prefix")]
    pub country_prefix: String,
    /// Number of digits expected after the prefix.
    #[serde(default = "default_digits")]
    pub digits: usize,
}

fn default_country_prefix() -> String {
    "+7".to_string()
}
fn default_digits() -> usize {
    10
}

impl ContactConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let code_ok = self
            .country_prefix
            .strip_prefix('+')
            .is_some_and(|code| !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()));
        if !code_ok {
            return Err(ConfigValidationError::InvalidCountryPrefix(self.country_prefix.clone()));
        }
        if self.digits == 0 || self.digits > 15 {
            return Err(ConfigValidationError::InvalidDigitCount);
        }
        Ok(())
    }
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            country_prefix: default_country_prefix(),
            digits: default_digits(),
        }
    }
}

// --- Logging Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gcal: GcalConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub contact: ContactConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Checks everything the bot needs before it talks to Telegram.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigValidationError::MissingBotToken);
        }
        if self
            .gcal
            .calendar_id
            .as_deref()
            .map_or(true, |id| id.trim().is_empty())
        {
            return Err(ConfigValidationError::MissingCalendarId);
        }
        self.validate_schedule()?;
        self.contact.validate()
    }

    /// The subset of [`AppConfig::validate`] that tools without a bot token
    /// (the report binary, tests) still rely on.
    pub fn validate_schedule(&self) -> Result<(), ConfigValidationError> {
        let schedule = &self.schedule;
        schedule.tz()?;
        schedule.closed_day()?;
        if schedule.work_start_hour >= schedule.work_end_hour || schedule.work_end_hour > 24 {
            return Err(ConfigValidationError::InvalidWorkHours {
                start: schedule.work_start_hour,
                end: schedule.work_end_hour,
            });
        }
        if schedule.booking_horizon_days == 0 {
            return Err(ConfigValidationError::EmptyHorizon);
        }
        Ok(())
    }
}
