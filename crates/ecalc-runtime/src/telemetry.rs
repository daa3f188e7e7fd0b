//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::ConfigError;

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level when set.
///
/// # Errors
/// Returns [`ConfigError::Logging`] for a bad directive or if a subscriber
/// is already installed
pub fn init(config: &LoggingConfig) -> Result<(), ConfigError> {
    init_with(config, None)
}

/// Install the global subscriber with an explicit filter override
///
/// Precedence is `explicit`, then `RUST_LOG`, then `config.level`, so a
/// command-line flag beats the environment.
///
/// # Errors
/// Same as [`init`]
pub fn init_with(config: &LoggingConfig, explicit: Option<&str>) -> Result<(), ConfigError> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = select_directive(explicit, from_env.as_deref(), &config.level);
    let filter = EnvFilter::try_new(directive)
        .map_err(|e| ConfigError::Logging(format!("bad level '{directive}': {e}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| ConfigError::Logging(e.to_string()))
}

fn select_directive<'a>(
    explicit: Option<&'a str>,
    from_env: Option<&'a str>,
    configured: &'a str,
) -> &'a str {
    explicit
        .or(from_env.filter(|d| !d.trim().is_empty()))
        .unwrap_or(configured)
}
