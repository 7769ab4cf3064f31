//! Application bootstrap.
//!
//! # Responsibilities
//! - Own the router, middleware registry and session store
//! - Build the global pipeline for each request from config
//! - Run it inside an output-buffering scope
//!
//! # Design Decisions
//! - Middleware instances are per request; shared state lives in whatever
//!   a factory captures (rate limiter buckets, config handle)
//! - A failed request never returns partial output: the buffer is dropped
//!   with the error and only the error is handed back, unchanged

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::SharedConfig;
use crate::context::{RequestContext, SessionStore};
use crate::error::Result;
use crate::http::response::Response;
use crate::pipeline::{Handler, Middleware, MiddlewareFactory, MiddlewarePipeline, MiddlewareRegistry};
use crate::routing::{ControllerRegistry, Router};

/// The request-processing application.
pub struct App {
    config: SharedConfig,
    router: Router,
    middleware: Arc<MiddlewareRegistry>,
    extra: Vec<MiddlewareFactory>,
    sessions: Arc<SessionStore>,
}

impl App {
    pub fn new(
        config: SharedConfig,
        controllers: ControllerRegistry,
        middleware: MiddlewareRegistry,
    ) -> Self {
        let middleware = Arc::new(middleware);
        let router = Router::new(Arc::clone(&config), controllers, Arc::clone(&middleware));
        let idle_timeout = config.load().settings().session.idle_timeout_secs;
        Self {
            config,
            router,
            middleware,
            extra: Vec::new(),
            sessions: Arc::new(SessionStore::with_idle_timeout(Duration::from_secs(idle_timeout))),
        }
    }

    /// Replace the handler for unmatched routes.
    pub fn with_not_found(mut self, handler: impl Handler + Send + Sync + 'static) -> Self {
        self.router = self.router.with_not_found(handler);
        self
    }

    /// Share a session store with other apps or tests.
    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Append global middleware after the configured `middleware.global` list.
    pub fn add_middleware<F, M>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Middleware + 'static,
    {
        self.extra
            .push(Arc::new(move || Box::new(factory()) as Box<dyn Middleware>));
        self
    }

    /// Process one request: global middleware, then the router.
    pub fn run(&self, request: &mut RequestContext) -> Result<Response> {
        let global = self.config.load().settings().middleware.global.clone();

        let mut pipeline = MiddlewarePipeline::new();
        for middleware in self.middleware.create_all(global.iter().map(String::as_str)) {
            pipeline.pipe_boxed(middleware);
        }
        for factory in &self.extra {
            pipeline.pipe_boxed(factory());
        }
        pipeline.set_fallback(&self.router);
        debug!(stages = pipeline.len(), "Global pipeline built");

        let mut response = Response::new();
        pipeline.handle(request, &mut response)?;
        Ok(response)
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn middleware(&self) -> &MiddlewareRegistry {
        &self.middleware
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }
}
