//! Booking conversation for the clinic bot.
//!
//! * [`state`]: per-user conversation state behind per-key locks
//! * [`flow`]: the state machine, including the commit and cancel sequences
//! * [`dispatch`]: routing of commands, button callbacks and free text
//! * [`presenter`]: transport-neutral replies

pub mod dispatch;
pub mod flow;
pub mod presenter;
pub mod state;

#[cfg(test)]
mod dispatch_test;
#[cfg(test)]
mod fakes;

pub use dispatch::{parse_admin_chat, CallbackAction, ChatDispatcher, Command, Inbound};
pub use flow::{BookingFlow, CancelOutcome, CommitOutcome, ContactPolicy, DateOutcome, FlowError};
pub use presenter::Presenter;
pub use state::{ConversationState, ConversationStore, Step};
