//! Tracing subscriber setup for embedders.
//!
//! The engine only emits `tracing` events. Whoever embeds it decides where
//! they go; this helper installs the same stack a standalone binary would.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::EngineConfig;

/// Install a global `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to `config.log_filter`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(config: &EngineConfig) -> bool {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str())),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        let config = EngineConfig::default();
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
