use crate::messages::Envelope;
use std::collections::VecDeque;

/// Number of envelopes kept when no capacity is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// A bounded, newest-first history of decoded envelopes.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    entries: VecDeque<Envelope>,
    capacity: usize,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl EventBuffer {
    /// Creates a buffer holding at most `capacity` envelopes (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Decodes a raw frame and records it as the newest entry.
    ///
    /// Frames that fail to decode are dropped and the buffer is left untouched.
    /// Returns the stored envelope so the caller can fan it out further.
    pub fn ingest(&mut self, raw: &str) -> Option<&Envelope> {
        match Envelope::decode(raw) {
            Ok(envelope) => Some(self.push(envelope)),
            Err(e) => {
                tracing::debug!(error = %e, "Discarding malformed frame.");
                None
            }
        }
    }

    /// Records an already decoded envelope as the newest entry.
    pub fn push(&mut self, envelope: Envelope) -> &Envelope {
        self.entries.push_front(envelope);
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    /// The most recently ingested envelope.
    pub fn latest(&self) -> Option<&Envelope> {
        self.entries.front()
    }

    /// Iterates the history from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(seq: usize) -> String {
        json!({
            "type": "tick",
            "channel": "market",
            "timestamp": "2024-05-02T01:00:00Z",
            "payload": {"seq": seq},
        })
        .to_string()
    }

    fn seq_of(envelope: &Envelope) -> u64 {
        envelope.payload["seq"].as_u64().unwrap()
    }

    #[test]
    fn empty_buffer_has_no_latest() {
        let buffer = EventBuffer::default();
        assert!(buffer.latest().is_none());
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn keeps_newest_first_and_caps_history() {
        let mut buffer = EventBuffer::default();
        for seq in 0..250 {
            buffer.ingest(&frame(seq));
            assert!(buffer.len() <= DEFAULT_HISTORY_CAPACITY);
        }

        assert_eq!(buffer.len(), 100);
        assert_eq!(seq_of(buffer.latest().unwrap()), 249);

        let seqs: Vec<u64> = buffer.iter().map(seq_of).collect();
        let expected: Vec<u64> = (150..250).rev().collect();
        assert_eq!(seqs, expected);
    }

    #[test]
    fn malformed_frames_leave_buffer_unchanged() {
        let mut buffer = EventBuffer::with_capacity(3);
        buffer.ingest(&frame(1));

        assert!(buffer.ingest("{ definitely not json").is_none());
        assert!(buffer.ingest(r#"{"type": "x", "channel": "y"}"#).is_none());

        assert_eq!(buffer.len(), 1);
        assert_eq!(seq_of(buffer.latest().unwrap()), 1);
    }

    #[test]
    fn clear_drops_history() {
        let mut buffer = EventBuffer::with_capacity(3);
        buffer.ingest(&frame(1));
        buffer.ingest(&frame(2));
        buffer.clear();
        assert!(buffer.latest().is_none());
    }
}
