use crate::messages::{Envelope, FeedMessage};
use core_types::SessionStatus;
use std::collections::HashMap;

/// A keyed, last-write-wins view of live session status.
///
/// Entries are only ever replaced whole or removed explicitly; nothing expires on its own.
#[derive(Debug, Clone, Default)]
pub struct SessionStatusProjector {
    sessions: HashMap<i64, SessionStatus>,
}

impl SessionStatusProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one envelope into the projection.
    ///
    /// Only `session.status` on the trading channel is considered. Returns the session id
    /// that was updated, if any.
    pub fn apply(&mut self, envelope: &Envelope) -> Option<i64> {
        match envelope.message() {
            Ok(FeedMessage::SessionStatus(status)) => {
                let session_id = status.session_id;
                self.sessions.insert(session_id, status);
                Some(session_id)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring undecodable session status payload.");
                None
            }
        }
    }

    pub fn get(&self, session_id: i64) -> Option<&SessionStatus> {
        self.sessions.get(&session_id)
    }

    /// Evicts a session, typically once its owner has torn it down.
    pub fn remove(&mut self, session_id: i64) -> Option<SessionStatus> {
        self.sessions.remove(&session_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionStatus> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
