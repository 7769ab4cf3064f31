//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route string (query key `q`)
//!     → matcher.rs (split, default action, group, PascalCase segments)
//!     → registry.rs (identifier lookup, `Controller` suffix retry)
//!     → router.rs (instantiate, attach group middleware)
//!     → controller.rs (controller middleware pipeline → action)
//!     → or NotFound when nothing matched
//!
//! Registration (at startup):
//!     ControllerRegistry::register("Admin::Users::Edit", factory)
//! ```
//!
//! # Design Decisions
//! - Controllers are registered explicitly, no reflection
//! - Deterministic: same route and config always pick the same controller
//! - One resolution strategy; there is no secondary "pop the action" mode

pub mod controller;
pub mod matcher;
pub mod registry;
pub mod router;

pub use controller::{Controller, ControllerMiddleware, RoutedController};
pub use matcher::{MiddlewareGroup, RouteKey};
pub use registry::{ControllerFactory, ControllerRegistry};
pub use router::{NotFound, ResolvedRoute, Router};
