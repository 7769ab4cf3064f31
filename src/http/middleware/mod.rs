//! Built-in middleware, registered by identifier.
//!
//! | identifier         | behavior                                         |
//! |--------------------|--------------------------------------------------|
//! | `request_log`      | logs method, route, status and time after the chain |
//! | `security_headers` | sets hardening headers, then continues           |
//! | `auth`             | requires the configured session key              |
//! | `rate_limit`       | token bucket per client address, 429 when empty  |
//!
//! Factories read the current config snapshot when they build an instance,
//! so reloaded settings apply from the next request on.

use std::sync::Arc;

use crate::config::SharedConfig;
use crate::pipeline::MiddlewareRegistry;

pub mod access_control;
pub mod rate_limit;
pub mod request_log;
pub mod security_headers;

pub use access_control::SessionGuard;
pub use rate_limit::{RateLimit, RateLimiter};
pub use request_log::RequestLog;
pub use security_headers::SecurityHeaders;

pub const REQUEST_LOG: &str = "request_log";
pub const SECURITY_HEADERS: &str = "security_headers";
pub const AUTH: &str = "auth";
pub const RATE_LIMIT: &str = "rate_limit";

/// Register every built-in under its identifier.
///
/// Returns the rate limiter shared by every `rate_limit` instance, so its
/// buckets can be swept.
pub fn register_builtins(registry: &mut MiddlewareRegistry, config: &SharedConfig) -> Arc<RateLimiter> {
    registry
        .register(REQUEST_LOG, || RequestLog)
        .register(SECURITY_HEADERS, || SecurityHeaders);

    let auth_config = Arc::clone(config);
    registry.register(AUTH, move || SessionGuard::from_config(&auth_config.load().settings().auth));

    let limiter = Arc::new(RateLimiter::new());
    let shared_limiter = Arc::clone(&limiter);
    let limit_config = Arc::clone(config);
    registry.register(RATE_LIMIT, move || {
        RateLimit::new(Arc::clone(&shared_limiter), &limit_config.load().settings().rate_limit)
    });
    limiter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{shared, Config};

    #[test]
    fn test_all_builtins_registered() {
        let mut registry = MiddlewareRegistry::new();
        register_builtins(&mut registry, &shared(Config::default()));

        for id in [REQUEST_LOG, SECURITY_HEADERS, AUTH, RATE_LIMIT] {
            assert!(registry.create(id).is_some(), "{id} missing");
        }
        assert_eq!(registry.len(), 4);
    }
}
