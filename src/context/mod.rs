//! Per-request data model.
//!
//! # Data Flow
//! ```text
//! HTTP request (axum)
//!     → http/request.rs (server data, query, body, cookies, uploads)
//!     → session.rs (resume or start session)
//!     → files.rs (normalize uploads)
//!     → RequestContext (owned by one request, passed by &mut through the chain)
//! ```
//!
//! # Design Decisions
//! - One context per request, constructed explicitly; never a global
//! - Unified lookup precedence: server, query, post, session, cookie
//! - Values are JSON values so arrays and nested maps survive intact

use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub mod files;
pub mod session;

pub use files::{normalize_files, FileField, RawUpload, UploadedFile};
pub use session::{Session, SessionStore};

/// Query key carrying the route string.
pub const ROUTE_KEY: &str = "q";

/// Everything known about the incoming request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    server: Map<String, Value>,
    query: Map<String, Value>,
    post: Map<String, Value>,
    cookies: Map<String, Value>,
    session: Session,
    files: BTreeMap<String, Vec<UploadedFile>>,
}

impl RequestContext {
    /// An empty context with a detached session.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, server: Map<String, Value>) -> Self {
        self.server = server;
        self
    }

    pub fn with_query(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn with_post(mut self, post: Map<String, Value>) -> Self {
        self.post = post;
        self
    }

    pub fn with_cookies(mut self, cookies: Map<String, Value>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Attach uploads in the flattened layout; they are normalized here.
    pub fn with_uploads(mut self, raw: &BTreeMap<String, RawUpload>) -> Self {
        self.files = normalize_files(raw);
        self
    }

    /// Look a key up across all sources.
    ///
    /// Order: server data, query, post body, session, cookies. The first
    /// source holding the key wins.
    pub fn request(&self, key: &str) -> Option<&Value> {
        self.server(key)
            .or_else(|| self.query(key))
            .or_else(|| self.post(key))
            .or_else(|| self.session(key))
            .or_else(|| self.cookie(key))
    }

    pub fn server(&self, key: &str) -> Option<&Value> {
        self.server.get(key)
    }

    pub fn set_server(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.server.insert(key.into(), value.into());
    }

    pub fn query(&self, key: &str) -> Option<&Value> {
        self.query.get(key)
    }

    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.query.insert(key.into(), value.into());
    }

    pub fn post(&self, key: &str) -> Option<&Value> {
        self.post.get(key)
    }

    pub fn set_post(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.post.insert(key.into(), value.into());
    }

    pub fn session(&self, key: &str) -> Option<&Value> {
        self.session.get(key)
    }

    pub fn set_session(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.session.insert(key, value);
    }

    /// Drop all session data, including the stored copy.
    pub fn clear_session(&mut self) {
        self.session.clear();
    }

    pub fn session_state(&self) -> &Session {
        &self.session
    }

    pub fn cookie(&self, key: &str) -> Option<&Value> {
        self.cookies.get(key)
    }

    pub fn set_cookie(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.cookies.insert(key.into(), value.into());
    }

    /// All uploads, keyed by form field.
    pub fn files(&self) -> &BTreeMap<String, Vec<UploadedFile>> {
        &self.files
    }

    /// Uploads for one field; empty when the field carried none.
    pub fn file(&self, field: &str) -> &[UploadedFile] {
        self.files.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The route string (`q` query parameter), empty when absent.
    pub fn route(&self) -> &str {
        self.query(ROUTE_KEY).and_then(Value::as_str).unwrap_or("")
    }

    pub fn method(&self) -> Option<&str> {
        self.server("REQUEST_METHOD").and_then(Value::as_str)
    }

    pub fn is_post(&self) -> bool {
        self.method() == Some("POST")
    }

    pub fn is_get(&self) -> bool {
        self.method() == Some("GET")
    }
}
