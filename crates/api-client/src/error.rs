use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Failed to send the HTTP request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("The API request returned {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("The session has expired. Please log in again.")]
    SessionExpired,

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Credential storage error: {0}")]
    Credential(#[from] CredentialError),
}

impl RequestError {
    /// The HTTP status behind this error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            RequestError::SessionExpired => Some(StatusCode::UNAUTHORIZED),
            RequestError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Failed to access the credentials file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode credentials: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid credential: {0}")]
    Invalid(#[from] core_types::CoreError),
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("No access token is available; log in before opening the push channel.")]
    MissingCredential,

    #[error("Invalid push channel URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
