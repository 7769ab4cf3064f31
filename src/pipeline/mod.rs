//! Middleware pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! MiddlewarePipeline::handle(request, response)
//!     → stage[0].process(request, response, Next{1})
//!         → next.run() → stage[1].process(.., Next{2})
//!             → ...
//!                 → fallback.handle(request, response)
//!             ← post-processing in stage[1]
//!     ← post-processing in stage[0]
//! ```
//!
//! # Design Decisions
//! - Chain of responsibility with a terminal fallback (onion model)
//! - Continuations are consumed on use: a stage can advance the chain once
//!   and never replay earlier stages
//! - The stage list is borrowed immutably while running, so it cannot change
//!   mid-execution
//! - No error handling inside the pipeline; errors propagate to the caller

mod handler;
#[allow(clippy::module_inception)]
mod pipeline;
pub mod registry;

pub use handler::{handler_fn, middleware_fn, Handler, HandlerFn, Middleware, MiddlewareFn};
pub use pipeline::{MiddlewarePipeline, Next};
pub use registry::{MiddlewareFactory, MiddlewareRegistry};
