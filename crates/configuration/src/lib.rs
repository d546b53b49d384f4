use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{ApiConfig, ChannelConfig, Config, CredentialsConfig, LoggingConfig};

/// Prefix for environment overrides, e.g. `RICHER__CHANNEL__URL`.
const ENV_PREFIX: &str = "RICHER";

/// Loads the application configuration from `config.toml` (if present) and the environment.
///
/// This function is the primary entry point for this crate. Every key has a built-in
/// default, so a missing file is not an error.
pub fn load_config() -> Result<Config, ConfigError> {
    build(config::File::with_name("config.toml").required(false))
}

/// Loads the configuration from an explicit TOML file, which must exist.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    build(config::File::from(path).required(true))
}

fn build<S>(file: S) -> Result<Config, ConfigError>
where
    S: config::Source + Send + Sync + 'static,
{
    let builder = config::Config::builder()
        .set_default("api.base_url", "http://localhost:8000/api/v1")?
        .set_default("api.timeout_secs", 30)?
        .set_default("channel.url", "ws://localhost:8000/ws")?
        .set_default("channel.reconnect_delay_secs", 5)?
        .set_default("channel.history_capacity", 100)?
        .set_default("credentials.path", ".richer/credentials.json")?
        .set_default("logging.level", "info")?
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}
