//! Logging setup utilities for the agora chat binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// This function sets up logging for the workspace crates and the calling
/// binary. The log level can be overridden using the `RUST_LOG` environment
/// variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "agora-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info")
///
/// # Examples
///
/// ```no_run
/// use agora_shared::logger::setup_logger;
///
/// setup_logger("agora-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "agora_server={level},agora_client={level},agora_shared={level},{bin}={level}",
                    level = default_log_level,
                    bin = binary_name.replace('-', "_"),
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
