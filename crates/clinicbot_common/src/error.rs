// --- File: crates/clinicbot_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// Failure of an external calendar call, as seen by the booking flow.
///
/// The flow only needs to tell three situations apart: the backend could not
/// be reached, it refused the request, or the object is already gone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("calendar backend unavailable: {0}")]
    Unavailable(String),

    #[error("calendar backend rejected the request: {0}")]
    Rejected(String),

    #[error("calendar object not found: {0}")]
    NotFound(String),
}

/// Failure to deliver something through the chat transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("chat transport error: {0}")]
pub struct TransportError(pub String);

/// Process-level error, used by the binaries while bootstrapping.
///
/// Library crates keep their own error enums and convert at the edges.
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

pub fn config_error<T: fmt::Display>(message: T) -> ClinicError {
    ClinicError::ConfigError(message.to_string())
}

pub fn database_error<T: fmt::Display>(message: T) -> ClinicError {
    ClinicError::DatabaseError(message.to_string())
}
