//! Registry of live sessions, shared by the connection layer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::errors::{SessionError, SessionResult};
use super::info::{SessionInfo, SessionStatus};

/// Live sessions by id.
///
/// The registry only holds the read-only [`SessionStatus`]; each session
/// itself is owned by the connection that created it.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionStatus>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, status: Arc<SessionStatus>) -> SessionResult<()> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(status.id()) {
            return Err(SessionError::DuplicateSession(status.id().to_string()));
        }
        debug!(session_id = %status.id(), "Session registered");
        sessions.insert(status.id().to_string(), status);
        Ok(())
    }

    pub fn unregister(&self, session_id: &str) -> Option<Arc<SessionStatus>> {
        let removed = self.sessions.write().remove(session_id);
        if removed.is_some() {
            debug!(session_id = %session_id, "Session unregistered");
        }
        removed
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<SessionStatus>> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots of all live sessions, ordered by creation time.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .read()
            .values()
            .map(|status| status.info())
            .collect();
        infos.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::turn::ConversationState;

    #[test]
    fn test_register_and_unregister() {
        let registry = SessionRegistry::new();
        let status = Arc::new(SessionStatus::new("a"));

        registry.register(status.clone()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.register(status),
            Err(SessionError::DuplicateSession("a".to_string()))
        );

        assert!(registry.unregister("a").is_some());
        assert!(registry.unregister("a").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_reflects_live_state() {
        let registry = SessionRegistry::new();
        let status = Arc::new(SessionStatus::new("a"));
        registry.register(status.clone()).unwrap();

        status
            .state
            .transition(ConversationState::Listening, ConversationState::Processing);
        status.turn.store(3, std::sync::atomic::Ordering::Release);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].state, ConversationState::Processing);
        assert_eq!(snapshot[0].turn, 3);
    }
}
