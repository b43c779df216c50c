//! Conversation state for a session.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// The three states of a spoken-dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Waiting for or accumulating user speech.
    Listening,
    /// User speech ended; waiting for a generated reply.
    Processing,
    /// System audio is streaming to the client.
    Responding,
}

impl ConversationState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Listening => 0,
            Self::Processing => 1,
            Self::Responding => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Processing,
            2 => Self::Responding,
            _ => Self::Listening,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Responding => "responding",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free holder for a session's current state.
///
/// Writers go through [`StateCell::transition`], which only succeeds when the
/// cell still holds the expected source state. A reader therefore always sees
/// exactly one of the three states.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(initial: ConversationState) -> Self {
        Self(AtomicU8::new(initial.as_u8()))
    }

    pub fn get(&self) -> ConversationState {
        ConversationState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`. Returns false if the cell was not in `from`.
    pub fn transition(&self, from: ConversationState, to: ConversationState) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(ConversationState::Listening)
    }
}
