//! Per-user conversation state and the keyed store that serializes access to it.

use chrono::{DateTime, NaiveDate, Utc};
use clinicbot_common::models::UserId;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Where a user is in the booking flow, together with what they picked so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingDate,
    AwaitingTime {
        date: NaiveDate,
    },
    AwaitingName {
        slot: DateTime<Utc>,
    },
    AwaitingContact {
        slot: DateTime<Utc>,
        name: String,
    },
}

/// Tag of a [`ConversationState`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Idle,
    AwaitingDate,
    AwaitingTime,
    AwaitingName,
    AwaitingContact,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Idle => "idle",
            Step::AwaitingDate => "awaiting_date",
            Step::AwaitingTime => "awaiting_time",
            Step::AwaitingName => "awaiting_name",
            Step::AwaitingContact => "awaiting_contact",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConversationState {
    pub fn step(&self) -> Step {
        match self {
            ConversationState::Idle => Step::Idle,
            ConversationState::AwaitingDate => Step::AwaitingDate,
            ConversationState::AwaitingTime { .. } => Step::AwaitingTime,
            ConversationState::AwaitingName { .. } => Step::AwaitingName,
            ConversationState::AwaitingContact { .. } => Step::AwaitingContact,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }

    pub fn reset(&mut self) {
        *self = ConversationState::Idle;
    }
}

type Entry = Arc<Mutex<ConversationState>>;

/// Conversation states keyed by user.
///
/// Each user has their own async mutex. Whoever holds the guard returned by
/// [`ConversationStore::lock`] is the only writer of that user's state until
/// the guard is dropped; different users never wait on each other.
#[derive(Debug, Default)]
pub struct ConversationStore {
    entries: DashMap<UserId, Entry>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the state of `user`, creating an idle entry on first contact.
    pub async fn lock(&self, user: UserId) -> OwnedMutexGuard<ConversationState> {
        // Clone the Arc so the map shard is released before awaiting.
        let entry = self.entries.entry(user).or_default().clone();
        entry.lock_owned().await
    }

    /// Copy of the current state, for inspection.
    pub async fn snapshot(&self, user: UserId) -> ConversationState {
        match self.entries.get(&user).map(|e| e.clone()) {
            Some(entry) => entry.lock().await.clone(),
            None => ConversationState::Idle,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop idle entries that no task currently holds. Returns how many went.
    pub fn prune_idle(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            match entry.try_lock() {
                Ok(state) => !state.is_idle(),
                Err(_) => true,
            }
        });
        let pruned = before.saturating_sub(self.entries.len());
        debug!(pruned, remaining = self.entries.len(), "pruned idle conversations");
        pruned
    }
}
