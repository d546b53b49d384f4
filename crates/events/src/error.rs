use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventsError {
    #[error("Failed to decode envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("Failed to decode '{kind}' payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
