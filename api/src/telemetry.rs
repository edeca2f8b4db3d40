use crate::config::RunMode;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. `RUST_LOG` overrides the per-mode default.
pub fn init(mode: RunMode) -> Result<(), TryInitError> {
    let default_filter = match mode {
        RunMode::Development => "info,tower_http=debug",
        RunMode::Production => "info",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    match mode {
        // JSON output for containers/production
        RunMode::Production => registry
            .with(fmt::layer().json().with_target(true))
            .try_init(),
        RunMode::Development => registry.with(fmt::layer().with_target(true)).try_init(),
    }
}
