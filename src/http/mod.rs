//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, tower-http layers)
//!     → request.rs (build RequestContext, store uploads, start session)
//!     → App::run on a blocking thread (global pipeline → router)
//!     → response.rs (buffered status, headers, body)
//!     → server.rs (commit session, flush or 500)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{from_http, RequestError};
pub use response::{redirect_target, RedirectError, Response};
pub use server::{HttpServer, X_REQUEST_ID};
