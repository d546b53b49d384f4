use serde::{Deserialize, Serialize};

/// Lifecycle state of a trading session as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Pending,
    Running,
    Paused,
    Stopped,
    Error,
    /// Any state tag this client does not know yet.
    #[serde(other)]
    Unknown,
}

impl SessionState {
    /// Returns true while the backend is still driving the session.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
            SessionState::Error => "error",
            SessionState::Unknown => "unknown",
        }
    }
}

/// The strategy's most recent decision for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSignal {
    Buy,
    Sell,
    Hold,
    #[serde(other)]
    Unknown,
}

impl TradeSignal {
    /// Returns true if the signal asks for an order to be placed.
    pub fn is_actionable(&self) -> bool {
        matches!(self, TradeSignal::Buy | TradeSignal::Sell)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSignal::Buy => "BUY",
            TradeSignal::Sell => "SELL",
            TradeSignal::Hold => "HOLD",
            TradeSignal::Unknown => "UNKNOWN",
        }
    }
}
