pub mod enums;
pub mod error;
pub mod structs;
pub mod timestamp;

// Re-export the core types to provide a clean public API.
pub use enums::{SessionState, TradeSignal};
pub use error::CoreError;
pub use structs::{Credential, MarketStatus, SessionStatus, TokenResponse, UserProfile};
