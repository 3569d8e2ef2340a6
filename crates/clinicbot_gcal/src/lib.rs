// --- File: crates/clinicbot_gcal/src/lib.rs ---
pub mod auth;
pub mod logic;
#[cfg(test)]
mod logic_proptest;
pub mod service;

pub use logic::{CalendarGateway, GcalError, WorkingHours};
pub use service::{GcalServiceError, GoogleCalendarService};
