//! Fasty: a small HTTP request core.
//!
//! Requests are converted into a [`RequestContext`], passed through a
//! global [`MiddlewarePipeline`], and routed by query key `q` to a
//! registered [`Controller`], which runs behind its own middleware group.

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;

pub use config::{AppConfig, Config, SharedConfig};
pub use context::RequestContext;
pub use error::{Error, Result};
pub use http::{HttpServer, Response};
pub use lifecycle::{App, Shutdown};
pub use pipeline::{handler_fn, middleware_fn, Handler, Middleware, MiddlewarePipeline, MiddlewareRegistry, Next};
pub use routing::{Controller, ControllerMiddleware, ControllerRegistry, Router};
