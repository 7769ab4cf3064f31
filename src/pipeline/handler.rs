//! Handler and middleware capabilities.

use std::fmt;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::Result;
use crate::http::response::Response;
use crate::pipeline::Next;

/// Produces the response for a request.
///
/// Implemented by controllers' actions, the router, not-found handlers and
/// pipelines themselves. All output goes to `response`.
pub trait Handler {
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> Result<()>;
}

impl<H: Handler + ?Sized> Handler for &H {
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> Result<()> {
        (**self).handle(request, response)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> Result<()> {
        (**self).handle(request, response)
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> Result<()> {
        (**self).handle(request, response)
    }
}

/// Inspects a request and either continues the chain or answers it.
///
/// Calling `next.run(..)` continues; returning without calling it
/// short-circuits every later stage and the fallback handler. Code after
/// `next.run(..)` runs once the rest of the chain has returned.
pub trait Middleware {
    fn process(
        &self,
        request: &mut RequestContext,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<()>;
}

impl<M: Middleware + ?Sized> Middleware for &M {
    fn process(
        &self,
        request: &mut RequestContext,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<()> {
        (**self).process(request, response, next)
    }
}

impl<M: Middleware + ?Sized> Middleware for Box<M> {
    fn process(
        &self,
        request: &mut RequestContext,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<()> {
        (**self).process(request, response, next)
    }
}

/// A closure adapted into a [`Handler`]. See [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut RequestContext, &mut Response) -> Result<()>,
{
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> Result<()> {
        (self.f)(request, response)
    }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

/// Turn a closure into a handler.
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut RequestContext, &mut Response) -> Result<()>,
{
    HandlerFn { f }
}

/// A closure adapted into a [`Middleware`]. See [`middleware_fn`].
pub struct MiddlewareFn<F> {
    f: F,
}

impl<F> Middleware for MiddlewareFn<F>
where
    F: for<'n> Fn(&mut RequestContext, &mut Response, Next<'n>) -> Result<()>,
{
    fn process(
        &self,
        request: &mut RequestContext,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<()> {
        (self.f)(request, response, next)
    }
}

impl<F> fmt::Debug for MiddlewareFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareFn").finish_non_exhaustive()
    }
}

/// Turn a closure into middleware.
///
/// ```rust,ignore
/// let timing = middleware_fn(|request, response, next| {
///     let started = Instant::now();
///     let result = next.run(request, response);
///     tracing::debug!(elapsed = ?started.elapsed(), "chain finished");
///     result
/// });
/// ```
pub fn middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: for<'n> Fn(&mut RequestContext, &mut Response, Next<'n>) -> Result<()>,
{
    MiddlewareFn { f }
}
