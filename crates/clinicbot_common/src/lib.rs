// --- File: crates/clinicbot_common/src/lib.rs ---

pub mod error; // Error taxonomy shared by all crates
pub mod logging; // Subscriber setup
pub mod models; // Bookings, identities, outgoing messages
pub mod services; // Calendar and chat capability traits

pub use error::{config_error, database_error, ClinicError, GatewayError, TransportError};
pub use logging::{init_from_config, init_with_level};
pub use models::{Booking, Button, ChatId, NewBooking, OutgoingMessage, UserId, SLOT_MINUTES};
pub use services::{BoxFuture, CalendarEvent, CalendarEventResult, CalendarService, ChatTransport};
