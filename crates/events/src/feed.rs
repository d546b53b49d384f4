use crate::buffer::EventBuffer;
use crate::messages::Envelope;
use crate::projection::SessionStatusProjector;
use core_types::SessionStatus;
use parking_lot::RwLock;
use tokio::sync::broadcast;

const SUBSCRIBER_CAPACITY: usize = 256;

/// The shared read model fed by the push channel.
///
/// The connection task is the only writer of frames; UI collaborators read the history
/// and the per-session projection, or subscribe to envelopes as they arrive.
pub struct LiveFeed {
    buffer: RwLock<EventBuffer>,
    sessions: RwLock<SessionStatusProjector>,
    tx: broadcast::Sender<Envelope>,
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(EventBuffer::default())
    }
}

impl LiveFeed {
    pub fn new(buffer: EventBuffer) -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            buffer: RwLock::new(buffer),
            sessions: RwLock::new(SessionStatusProjector::new()),
            tx,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(EventBuffer::with_capacity(capacity))
    }

    /// Decodes a raw frame, records it and updates the session projection.
    ///
    /// Returns false if the frame was malformed and therefore discarded.
    pub fn ingest(&self, raw: &str) -> bool {
        let envelope = match self.buffer.write().ingest(raw) {
            Some(envelope) => envelope.clone(),
            None => return false,
        };

        if let Some(session_id) = self.sessions.write().apply(&envelope) {
            tracing::debug!(session_id, "Session status updated.");
        }

        // No subscribers is not an error.
        let _ = self.tx.send(envelope);
        true
    }

    /// Subscribes to envelopes accepted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<Envelope> {
        self.buffer.read().latest().cloned()
    }

    /// A newest-first copy of the retained history.
    pub fn history(&self) -> Vec<Envelope> {
        self.buffer.read().iter().cloned().collect()
    }

    pub fn clear_history(&self) {
        self.buffer.write().clear();
    }

    pub fn session(&self, session_id: i64) -> Option<SessionStatus> {
        self.sessions.read().get(session_id).cloned()
    }

    /// All projected sessions, ordered by id.
    pub fn sessions(&self) -> Vec<SessionStatus> {
        let mut sessions: Vec<SessionStatus> = self.sessions.read().iter().cloned().collect();
        sessions.sort_by_key(|s| s.session_id);
        sessions
    }

    pub fn remove_session(&self, session_id: i64) -> Option<SessionStatus> {
        self.sessions.write().remove(session_id)
    }
}
