//! Logging setup for the provider process.
//!
//! Logs go to **stderr**: stdout carries the plugin handshake line and must
//! not be interleaved with anything else.
//!
//! # Environment Variables
//!
//! - `ZIA_LOG`: filter directives for this provider (takes precedence)
//! - `RUST_LOG`: standard fallback when `ZIA_LOG` is unset
//!
//! ```bash
//! # Trace every API call the adapters make
//! ZIA_LOG=zia_provider::client=debug ./zia-provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "ZIA_LOG";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Install the global subscriber at `info` unless the environment says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Install the global subscriber with a custom fallback level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Like [`init_logging`], but returns `false` instead of panicking when a
/// subscriber is already installed.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // filter parsing is exercised here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("zia_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,zia_provider::client=trace").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
