//! Logging setup for the host and client processes

use crate::core::config::LoggingConfig;

/// Initialize the logging system with the configured default filter
///
/// `RUST_LOG` still takes precedence. Calling this more than once is harmless;
/// later calls are ignored.
pub fn init(config: &LoggingConfig) {
    let env = env_logger::Env::default().default_filter_or(config.level.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
