//! # Richer Events
//!
//! This crate defines the envelopes pushed by the backend over the WebSocket channel
//! and the client-side read model built from them: a bounded history of recent
//! envelopes and a per-session status projection.
//!
//! As a Layer 0 crate, it depends only on `core-types`.

// Declare the modules that make up this crate.
pub mod buffer;
pub mod error;
pub mod feed;
pub mod messages;
pub mod projection;

// Re-export the core types to provide a clean public API.
pub use buffer::{EventBuffer, DEFAULT_HISTORY_CAPACITY};
pub use error::EventsError;
pub use feed::LiveFeed;
pub use messages::{
    Envelope, FeedMessage, SessionStarted, SessionStopped, SESSION_STARTED, SESSION_STATUS,
    SESSION_STOPPED, TRADING_CHANNEL,
};
pub use projection::SessionStatusProjector;
