//! Response collaborator.
//!
//! # Responsibilities
//! - Buffer output written by middleware and handlers
//! - Carry status and headers until the request completes
//! - Validate and apply redirects
//!
//! # Design Decisions
//! - Nothing reaches the client until the bootstrap scope flushes the buffer
//! - A failed request drops the buffer, so partial output never leaks
//! - Redirect targets are sanitized (CR/LF stripped) and must be an absolute
//!   URL or an absolute path

use axum::http::header::{HeaderName, HeaderValue, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Rejected redirect target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedirectError {
    #[error("invalid redirect URL: {0}")]
    InvalidTarget(String),
}

/// Buffered response for one request.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set a header, replacing earlier values.
    pub fn set_header(&mut self, name: HeaderName, value: &str) -> Result<()> {
        let value = HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader {
            name: name.to_string(),
        })?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Append output to the buffer.
    pub fn write(&mut self, output: impl AsRef<[u8]>) {
        self.body.extend_from_slice(output.as_ref());
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Buffered output as text, lossily decoded.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Drop buffered output and headers; status returns to 200.
    pub fn discard(&mut self) {
        self.body.clear();
        self.headers.clear();
        self.status = StatusCode::OK;
    }

    /// Flush: hand out status, headers and body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status, self.headers, self.body)
    }

    /// Redirect to `url`, appending `args` as query parameters.
    ///
    /// The caller should return right after; later writes still land in the
    /// buffer.
    pub fn redirect(&mut self, url: &str, args: &[(&str, &str)]) -> Result<()> {
        let target = redirect_target(url, args)?;
        self.set_header(LOCATION, &target)?;
        self.status = StatusCode::FOUND;
        tracing::debug!(location = %target, "Redirecting");
        Ok(())
    }

    /// Redirect back to the referring page, or `/` when there is none.
    pub fn redirect_referer(&mut self, request: &RequestContext) -> Result<()> {
        let referer = request
            .request("HTTP_REFERER")
            .and_then(|v| v.as_str())
            .unwrap_or("/")
            .to_string();
        self.redirect(&referer, &[])
    }
}

/// Build and validate a redirect target.
pub fn redirect_target(url: &str, args: &[(&str, &str)]) -> Result<String, RedirectError> {
    let mut target = url.to_string();
    if !args.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(args)
            .finish();
        target.push(if target.contains('?') { '&' } else { '?' });
        target.push_str(&query);
    }

    target.retain(|c| c != '\r' && c != '\n');

    if url::Url::parse(&target).is_err() && !target.starts_with('/') {
        return Err(RedirectError::InvalidTarget(target));
    }
    Ok(target)
}
