//! Tracing initialization for embedding binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the `REFERRAL_LOG` environment variable.
///
/// Defaults to "info" level if `REFERRAL_LOG` is not set. Call once at
/// process start; later calls panic, so libraries must leave this to the
/// hosting binary.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
