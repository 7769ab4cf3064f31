//! Crate-wide error type.
//!
//! Route misses are not errors: the router answers them through the
//! not-found handler. Everything here is a failure that travels up the
//! middleware chain untouched until the bootstrap scope sees it.

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::http::response::RedirectError;

/// Errors raised by handlers, middleware and their collaborators.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Redirect(#[from] RedirectError),

    #[error("invalid value for header `{name}`")]
    InvalidHeader { name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by application code.
    #[error("{0}")]
    Handler(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Build a handler error from a message.
    pub fn handler(message: impl Into<String>) -> Self {
        Error::Handler(message.into())
    }

    /// Wrap any foreign error.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Other(Box::new(err))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
