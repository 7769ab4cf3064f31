//! Controllers and controller-level middleware.
//!
//! A routed controller runs behind its own middleware, separate from the
//! global pipeline that routed to it. The stack holds, in order, the
//! middleware the controller registers itself and then the middleware of
//! its route's group. Executing builds a short-lived pipeline with the
//! controller's action as fallback; with an empty stack the action runs
//! directly.

use std::fmt;

use crate::context::RequestContext;
use crate::error::Result;
use crate::http::response::Response;
use crate::pipeline::{Handler, Middleware, MiddlewarePipeline, MiddlewareRegistry};

/// A routed request handler.
pub trait Controller {
    /// Add middleware this controller always runs behind.
    fn register_middleware(&self, _middleware: &mut ControllerMiddleware<'_>) {}

    /// The controller's action.
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> Result<()>;
}

/// Middleware stack being assembled for one controller instance.
pub struct ControllerMiddleware<'r> {
    stack: Vec<Box<dyn Middleware>>,
    registry: &'r MiddlewareRegistry,
}

impl<'r> ControllerMiddleware<'r> {
    pub fn new(registry: &'r MiddlewareRegistry) -> Self {
        Self {
            stack: Vec::new(),
            registry,
        }
    }

    pub fn add(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.stack.push(Box::new(middleware));
        self
    }

    pub fn add_boxed(&mut self, middleware: Box<dyn Middleware>) -> &mut Self {
        self.stack.push(middleware);
        self
    }

    /// Add middleware by registry identifier; unknown identifiers are ignored.
    pub fn add_by_name(&mut self, id: &str) -> &mut Self {
        match self.registry.create(id) {
            Some(middleware) => self.stack.push(middleware),
            None => tracing::debug!(middleware = id, "Controller middleware not registered"),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// A controller instance together with its middleware stack.
pub struct RoutedController {
    controller: Box<dyn Controller>,
    middleware: Vec<Box<dyn Middleware>>,
}

impl RoutedController {
    /// Wrap a controller, collecting the middleware it registers.
    pub fn new(controller: Box<dyn Controller>, registry: &MiddlewareRegistry) -> Self {
        let mut stack = ControllerMiddleware::new(registry);
        controller.register_middleware(&mut stack);
        Self {
            controller,
            middleware: stack.stack,
        }
    }

    /// Append middleware after everything already attached.
    pub fn add_middleware(&mut self, middleware: Box<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    /// Run the action behind the attached middleware.
    pub fn execute(&self, request: &mut RequestContext, response: &mut Response) -> Result<()> {
        if self.middleware.is_empty() {
            return self.controller.handle(request, response);
        }

        let mut pipeline = MiddlewarePipeline::new();
        for middleware in &self.middleware {
            pipeline.pipe(&**middleware);
        }
        pipeline.set_fallback(Action(self.controller.as_ref()));
        pipeline.handle(request, response)
    }
}

impl fmt::Debug for RoutedController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutedController")
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

/// A controller's action as a pipeline fallback.
struct Action<'c>(&'c dyn Controller);

impl Handler for Action<'_> {
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> Result<()> {
        self.0.handle(request, response)
    }
}
