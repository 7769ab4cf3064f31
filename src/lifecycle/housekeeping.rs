//! Background sweeping of per-client state.
//!
//! Sessions and rate-limit buckets are created on demand by requests. This
//! task removes the ones nobody can observe any more: sessions idle past
//! `session.idle_timeout_secs` and buckets that have refilled completely.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::SharedConfig;
use crate::context::SessionStore;
use crate::http::middleware::RateLimiter;
use crate::observability::metrics;

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sweep {
    pub sessions: usize,
    pub buckets: usize,
}

/// Periodic sweeper for the session store and rate limiter.
pub struct Housekeeper {
    config: SharedConfig,
    sessions: Arc<SessionStore>,
    limiter: Option<Arc<RateLimiter>>,
}

impl Housekeeper {
    pub fn new(config: SharedConfig, sessions: Arc<SessionStore>) -> Self {
        Self {
            config,
            sessions,
            limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Remove expired sessions and full buckets once.
    pub fn sweep(&self) -> Sweep {
        let sessions = self.sessions.purge_idle();
        let buckets = match &self.limiter {
            Some(limiter) => {
                let config = self.config.load();
                let limits = &config.settings().rate_limit;
                limiter.purge_full(
                    f64::from(limits.requests_per_second),
                    f64::from(limits.burst_size.max(1)),
                )
            }
            None => 0,
        };

        if sessions > 0 || buckets > 0 {
            tracing::debug!(sessions, buckets, "Swept idle client state");
            metrics::record_evictions("session", sessions);
            metrics::record_evictions("rate_limit_bucket", buckets);
        }
        Sweep { sessions, buckets }
    }

    /// Sweep every `session.sweep_interval_secs` until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let period = self.config.load().settings().session.sweep_interval_secs.max(1);
        tracing::info!(interval_secs = period, "Housekeeping starting");

        let mut ticker = time::interval(Duration::from_secs(period));
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Housekeeping received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
