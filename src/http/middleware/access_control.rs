//! Session-based access control (`auth`).
//!
//! A request passes when its session holds the configured key. Otherwise
//! the chain stops here: with a login path the client is redirected there,
//! without one a 401 is written.

use axum::http::StatusCode;
use serde_json::Value;
use tracing::warn;

use crate::config::AuthConfig;
use crate::context::RequestContext;
use crate::error::Result;
use crate::http::response::Response;
use crate::pipeline::{Middleware, Next};

#[derive(Debug, Clone)]
pub struct SessionGuard {
    session_key: String,
    login_path: Option<String>,
}

impl SessionGuard {
    pub fn new(session_key: impl Into<String>, login_path: Option<String>) -> Self {
        Self {
            session_key: session_key.into(),
            login_path,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.session_key.clone(), config.login_path.clone())
    }

    fn is_authenticated(&self, request: &RequestContext) -> bool {
        !matches!(
            request.session(&self.session_key),
            None | Some(Value::Null) | Some(Value::Bool(false))
        )
    }
}

impl Middleware for SessionGuard {
    fn process(
        &self,
        request: &mut RequestContext,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<()> {
        if self.is_authenticated(request) {
            return next.run(request, response);
        }

        warn!(route = request.route(), "Rejected unauthenticated request");
        match &self.login_path {
            Some(path) => response.redirect(path, &[]),
            None => {
                response.set_status(StatusCode::UNAUTHORIZED);
                response.write("Unauthorized");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{handler_fn, MiddlewarePipeline};
    use axum::http::header::LOCATION;

    fn run(guard: SessionGuard, request: &mut RequestContext) -> Response {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.pipe(guard).set_fallback(handler_fn(|_, response| {
            response.write("secret");
            Ok(())
        }));
        let mut response = Response::new();
        pipeline.handle(request, &mut response).unwrap();
        response
    }

    #[test]
    fn test_missing_key_is_unauthorized() {
        let response = run(SessionGuard::new("user_id", None), &mut RequestContext::new());
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.body_text(), "Unauthorized");
    }

    #[test]
    fn test_login_path_redirects() {
        let guard = SessionGuard::new("user_id", Some("/?q=account/login".to_string()));
        let response = run(guard, &mut RequestContext::new());
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/?q=account/login");
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_session_key_lets_request_through() {
        let mut request = RequestContext::new();
        request.set_session("user_id", 42);
        let response = run(SessionGuard::new("user_id", None), &mut request);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body_text(), "secret");
    }

    #[test]
    fn test_null_value_is_not_a_login() {
        let mut request = RequestContext::new();
        request.set_session("user_id", Value::Null);
        let response = run(SessionGuard::new("user_id", None), &mut request);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
