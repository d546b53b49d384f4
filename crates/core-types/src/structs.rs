use crate::enums::{SessionState, TradeSignal};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The access/refresh token pair that authenticates both HTTP calls and the push channel.
///
/// A pair is always replaced as a whole; there is no way to update one token alone.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credential {
    /// Builds a credential pair, rejecting empty tokens.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        if access_token.is_empty() {
            return Err(CoreError::InvalidInput(
                "access_token".to_string(),
                "must not be empty".to_string(),
            ));
        }
        if refresh_token.is_empty() {
            return Err(CoreError::InvalidInput(
                "refresh_token".to_string(),
                "must not be empty".to_string(),
            ));
        }
        Ok(Self {
            access_token,
            refresh_token,
        })
    }
}

// Tokens never end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Response body of the login, register and refresh endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

impl TryFrom<TokenResponse> for Credential {
    type Error = CoreError;

    fn try_from(response: TokenResponse) -> Result<Self, Self::Error> {
        Credential::new(response.access_token, response.refresh_token)
    }
}

/// The authenticated user as returned by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default, deserialize_with = "crate::timestamp::deserialize_option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Market-hours information attached to a session status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub is_open: bool,
    pub reason: String,
    #[serde(default)]
    pub next_open: Option<String>,
    #[serde(default)]
    pub current_time: Option<String>,
}

/// The authoritative live snapshot of one trading session.
///
/// Every update replaces the previous snapshot, so a missing optional field means
/// the backend no longer reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: i64,
    #[serde(default)]
    pub stock_code: String,
    #[serde(default)]
    pub stock_name: String,
    pub status: SessionState,
    pub message: String,
    #[serde(default, deserialize_with = "crate::timestamp::deserialize_option")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_price: Option<Decimal>,
    #[serde(default)]
    pub signal: Option<TradeSignal>,
    #[serde(default)]
    pub signal_reason: Option<String>,
    #[serde(default, deserialize_with = "crate::timestamp::deserialize_option")]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "crate::timestamp::deserialize_option")]
    pub next_check_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub market_status: Option<MarketStatus>,
}
