//! Booking persistence for the clinic booking bot
//!
//! A database agnostic client built on SQLx's `Any` driver plus the booking
//! repository. SQLite is the default backend; PostgreSQL, which earlier
//! deployments of the bot used, is available through the `postgres` feature.
//!
//! # Example
//!
//! ```rust,no_run
//! use clinicbot_config::DatabaseConfig;
//! use clinicbot_db::{BookingRepository, DbClient, SqlBookingRepository};
//!
//! async fn setup_db() -> Result<SqlBookingRepository, Box<dyn std::error::Error>> {
//!     let db_client = DbClient::from_config(&DatabaseConfig::default()).await?;
//!     let repository = SqlBookingRepository::new(db_client);
//!     repository.init_schema().await?;
//!     Ok(repository)
//! }
//! ```

pub mod client;
pub mod error;
pub mod repositories;

pub use client::{DbBackend, DbClient};
pub use error::DbError;
pub use repositories::{BookingRepository, SqlBookingRepository};
