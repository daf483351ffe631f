use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServiceConfig;

pub use tracing_subscriber::util::TryInitError;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over [`ServiceConfig::log_filter`]. Returns an
/// error if a global subscriber is already set.
pub fn init_tracing(config: &ServiceConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    tracing::debug!(log_filter = %config.log_filter, "tracing initialized");

    Ok(())
}
