//! Per-client rate limiting (`rate_limit`).
//!
//! Token bucket keyed by `REMOTE_ADDR`. Buckets live in a [`RateLimiter`]
//! shared by every instance the factory builds; the instance only carries
//! the rate and burst read from config.
//!
//! A bucket that has refilled to capacity is indistinguishable from a new
//! one, so [`RateLimiter::purge_full`] can drop it without changing any
//! client's allowance.

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::context::RequestContext;
use crate::error::Result;
use crate::http::response::Response;
use crate::observability::metrics;
use crate::pipeline::{Middleware, Next};

/// Key used when the request carries no client address.
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token buckets for every client seen so far.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one token for `client`. Returns false when the bucket is empty.
    pub fn try_acquire(&self, client: &str, rate: f64, capacity: f64) -> bool {
        self.try_acquire_at(client, rate, capacity, Instant::now())
    }

    fn try_acquire_at(&self, client: &str, rate: f64, capacity: f64, now: Instant) -> bool {
        let mut bucket = self.buckets.entry(client.to_string()).or_insert(Bucket {
            tokens: capacity,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop every bucket that is full again. Returns how many went.
    pub fn purge_full(&self, rate: f64, capacity: f64) -> usize {
        self.purge_full_at(rate, capacity, Instant::now())
    }

    fn purge_full_at(&self, rate: f64, capacity: f64, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
            bucket.tokens + elapsed * rate < capacity
        });
        before.saturating_sub(self.buckets.len())
    }

    /// Number of clients tracked.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Middleware instance bound to a shared [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
    rate: f64,
    capacity: f64,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>, config: &RateLimitConfig) -> Self {
        Self {
            limiter,
            rate: f64::from(config.requests_per_second),
            capacity: f64::from(config.burst_size.max(1)),
        }
    }
}

impl Middleware for RateLimit {
    fn process(
        &self,
        request: &mut RequestContext,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<()> {
        let client = request
            .server("REMOTE_ADDR")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_CLIENT)
            .to_string();

        if self.limiter.try_acquire(&client, self.rate, self.capacity) {
            return next.run(request, response);
        }

        debug!(client = %client, "Rate limit exceeded");
        metrics::record_rate_limited();
        response.set_status(StatusCode::TOO_MANY_REQUESTS);
        response.write("Too Many Requests");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{handler_fn, MiddlewarePipeline};
    use std::time::Duration;

    #[test]
    fn test_bucket_drains_and_refills() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        assert!(limiter.try_acquire_at("a", 1.0, 2.0, start));
        assert!(limiter.try_acquire_at("a", 1.0, 2.0, start));
        assert!(!limiter.try_acquire_at("a", 1.0, 2.0, start));

        assert!(limiter.try_acquire_at("a", 1.0, 2.0, start + Duration::from_secs(1)));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        assert!(limiter.try_acquire_at("a", 0.0, 1.0, now));
        assert!(!limiter.try_acquire_at("a", 0.0, 1.0, now));
        assert!(limiter.try_acquire_at("b", 0.0, 1.0, now));
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_refilled_buckets_are_purged() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        assert!(limiter.try_acquire_at("idle", 1.0, 2.0, start));
        assert!(limiter.try_acquire_at("busy", 1.0, 2.0, start + Duration::from_secs(5)));
        assert!(limiter.try_acquire_at("busy", 1.0, 2.0, start + Duration::from_secs(5)));

        assert_eq!(limiter.purge_full_at(1.0, 2.0, start + Duration::from_millis(500)), 0);
        assert_eq!(limiter.purge_full_at(1.0, 2.0, start + Duration::from_secs(6)), 1);
        assert_eq!(limiter.len(), 1);

        // The surviving client kept its drained state.
        assert!(limiter.try_acquire_at("busy", 1.0, 2.0, start + Duration::from_secs(6)));
        assert!(!limiter.try_acquire_at("busy", 1.0, 2.0, start + Duration::from_secs(6)));
    }

    #[test]
    fn test_exhausted_client_gets_429() {
        let limiter = Arc::new(RateLimiter::new());
        let config = RateLimitConfig {
            requests_per_second: 0,
            burst_size: 1,
        };

        let mut statuses = Vec::new();
        for _ in 0..2 {
            let mut pipeline = MiddlewarePipeline::new();
            pipeline
                .pipe(RateLimit::new(Arc::clone(&limiter), &config))
                .set_fallback(handler_fn(|_, response| {
                    response.write("ok");
                    Ok(())
                }));

            let mut request = RequestContext::new();
            request.set_server("REMOTE_ADDR", "10.0.0.1");
            let mut response = Response::new();
            pipeline.handle(&mut request, &mut response).unwrap();
            statuses.push(response.status());
        }

        assert_eq!(statuses, vec![StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
    }
}
