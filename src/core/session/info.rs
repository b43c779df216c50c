//! Read-only view of a live session for status endpoints.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::turn::{ConversationState, StateCell};

/// Session fields other tasks may read while the session runs.
///
/// Only the owning session writes them.
#[derive(Debug)]
pub struct SessionStatus {
    id: String,
    created_at: DateTime<Utc>,
    pub(super) state: StateCell,
    pub(super) turn: AtomicU64,
    pub(super) interruptions: AtomicUsize,
}

impl SessionStatus {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            state: StateCell::default(),
            turn: AtomicU64::new(0),
            interruptions: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ConversationState {
        self.state.get()
    }

    pub fn turn(&self) -> u64 {
        self.turn.load(Ordering::Acquire)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            state: self.state(),
            turn: self.turn(),
            interruptions: self.interruptions.load(Ordering::Relaxed),
            created_at: self.created_at,
        }
    }
}

/// Snapshot of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub state: ConversationState,
    pub turn: u64,
    pub interruptions: usize,
    pub created_at: DateTime<Utc>,
}
