//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Read the route string from query key `q`
//! - Resolve it to a registered controller and a middleware group
//! - Attach the group's middleware and execute the controller
//! - Hand unmatched routes to the not-found handler
//!
//! # Design Decisions
//! - Resolution is a registry lookup; nothing is built from strings at runtime
//! - A miss is not an error: it ends in the not-found handler, like a
//!   middleware short-circuit ends in its own response
//! - Group middleware is read from the current config snapshot per request,
//!   so reloads apply to the next request

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{debug, Level};

use crate::config::SharedConfig;
use crate::context::RequestContext;
use crate::error::Result;
use crate::http::response::Response;
use crate::observability::metrics;
use crate::pipeline::{Handler, MiddlewareRegistry};
use crate::routing::controller::RoutedController;
use crate::routing::matcher::{MiddlewareGroup, RouteKey};
use crate::routing::registry::{ControllerFactory, ControllerRegistry};

/// Outcome of resolving a route string.
#[derive(Clone)]
pub struct ResolvedRoute {
    /// Fully qualified controller identifier.
    pub identifier: String,
    pub group: MiddlewareGroup,
    factory: ControllerFactory,
}

impl fmt::Debug for ResolvedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedRoute")
            .field("identifier", &self.identifier)
            .field("group", &self.group)
            .finish()
    }
}

/// Maps route strings onto controllers.
pub struct Router {
    config: SharedConfig,
    controllers: ControllerRegistry,
    middleware: Arc<MiddlewareRegistry>,
    not_found: Box<dyn Handler + Send + Sync>,
}

impl Router {
    pub fn new(
        config: SharedConfig,
        controllers: ControllerRegistry,
        middleware: Arc<MiddlewareRegistry>,
    ) -> Self {
        Self {
            config,
            controllers,
            middleware,
            not_found: Box::new(NotFound),
        }
    }

    /// Replace the handler invoked for unmatched routes.
    pub fn with_not_found(mut self, handler: impl Handler + Send + Sync + 'static) -> Self {
        self.not_found = Box::new(handler);
        self
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    /// Route the request to its controller, or to the not-found handler.
    pub fn dispatch(&self, request: &mut RequestContext, response: &mut Response) -> Result<()> {
        let route = request.route().to_string();
        let span = tracing::span!(Level::DEBUG, "dispatch", route = %route);
        let _enter = span.enter();

        match self.resolve(&route) {
            Some(resolved) => self.execute(&resolved, request, response),
            None => {
                debug!("No controller matched");
                metrics::record_route_miss();
                self.not_found.handle(request, response)
            }
        }
    }

    /// Resolve a route string without executing anything.
    pub fn resolve(&self, route: &str) -> Option<ResolvedRoute> {
        let key = RouteKey::parse(route);
        let (identifier, factory) = self.controllers.lookup(key.path())?;
        Some(ResolvedRoute {
            identifier: identifier.to_string(),
            group: key.group(),
            factory: Arc::clone(factory),
        })
    }

    fn execute(
        &self,
        resolved: &ResolvedRoute,
        request: &mut RequestContext,
        response: &mut Response,
    ) -> Result<()> {
        let mut routed = RoutedController::new((resolved.factory)(), &self.middleware);

        let ids: Vec<String> = self
            .config
            .load()
            .get_or(&resolved.group.config_key(), Vec::new());
        for middleware in self.middleware.create_all(ids.iter().map(String::as_str)) {
            routed.add_middleware(middleware);
        }

        debug!(
            controller = %resolved.identifier,
            group = %resolved.group,
            middleware = routed.middleware_count(),
            "Executing controller"
        );
        metrics::record_dispatch(resolved.group.as_str());

        routed.execute(request, response)
    }
}

impl Handler for Router {
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> Result<()> {
        self.dispatch(request, response)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("controllers", &self.controllers)
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}

/// Default not-found handler: a plain 404.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

impl Handler for NotFound {
    fn handle(&self, _request: &mut RequestContext, response: &mut Response) -> Result<()> {
        response.set_status(StatusCode::NOT_FOUND);
        response.write("Not Found");
        Ok(())
    }
}
