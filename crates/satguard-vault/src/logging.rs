//! Tracing subscriber setup for applications embedding the vault.

use satguard_core::config::LoggingConfig;
use satguard_core::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber from `config`.
///
/// `SATGUARD_LOG` takes precedence over the configured level. Returns `false`
/// if a global subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_env(env::vars::SATGUARD_LOG)
        .unwrap_or_else(|_| format!("satguard={}", config.level.as_directive()).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(config.json.then(|| fmt::layer().json()))
        .with((!config.json).then(fmt::layer))
        .try_init()
        .is_ok()
}
