//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → registries → App → HttpServer
//!
//! Per request (startup.rs):
//!     RequestContext → global pipeline → Router → buffered Response
//!
//! Background (housekeeping.rs):
//!     interval → purge idle sessions and full rate-limit buckets
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → broadcast → server drains and stops
//! ```

pub mod housekeeping;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use housekeeping::{Housekeeper, Sweep};
pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::App;
