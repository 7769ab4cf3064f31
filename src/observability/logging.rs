//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Take the level from `RUST_LOG` when set, else from config
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - A second initialization is ignored, so tests can call it freely

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Directive used when neither `RUST_LOG` nor the config level parses.
const FALLBACK_DIRECTIVE: &str = "fasty=info,tower_http=info";

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(&config.log_level)))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVE));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

/// `debug` → `fasty=debug,tower_http=debug`; full directives pass through.
fn filter_directive(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("fasty={level},tower_http={level}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_level_expands() {
        assert_eq!(filter_directive("debug"), "fasty=debug,tower_http=debug");
        assert_eq!(filter_directive("fasty=trace"), "fasty=trace");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = ObservabilityConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
