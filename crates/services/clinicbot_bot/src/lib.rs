//! Telegram front-end of the clinic booking bot.
//!
//! [`app`] builds the booking dispatcher from configuration, [`telegram`]
//! feeds it updates from the Bot API.

pub mod app;
pub mod telegram;
