use crate::error::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub channel: ChannelConfig,
    pub credentials: CredentialsConfig,
    pub logging: LoggingConfig,
}

/// Settings for the HTTP request client.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is appended to (e.g., "http://localhost:8000/api/v1").
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

/// Settings for the push channel and the read model it feeds.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// WebSocket endpoint; the access token is appended as the `token` query parameter.
    pub url: String,
    /// Fixed delay between an unexpected close and the next connection attempt.
    pub reconnect_delay_secs: u64,
    /// How many recent envelopes are retained.
    pub history_capacity: usize,
}

/// Where the credential pair is persisted between runs.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ChannelConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl Config {
    /// Checks the invariants the rest of the application relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let api_url = Url::parse(&self.api.base_url).map_err(|e| {
            ConfigError::ValidationError(format!("api.base_url '{}': {}", self.api.base_url, e))
        })?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url must be http or https, got '{}'",
                api_url.scheme()
            )));
        }

        let channel_url = Url::parse(&self.channel.url).map_err(|e| {
            ConfigError::ValidationError(format!("channel.url '{}': {}", self.channel.url, e))
        })?;
        if !matches!(channel_url.scheme(), "ws" | "wss") {
            return Err(ConfigError::ValidationError(format!(
                "channel.url must be ws or wss, got '{}'",
                channel_url.scheme()
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.channel.reconnect_delay_secs == 0 {
            return Err(ConfigError::ValidationError(
                "channel.reconnect_delay_secs must be greater than zero".to_string(),
            ));
        }
        if self.channel.history_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "channel.history_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
