//! Hardening headers (`security_headers`).

use axum::http::header::{REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS};

use crate::context::RequestContext;
use crate::error::Result;
use crate::http::response::Response;
use crate::pipeline::{Middleware, Next};

#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityHeaders;

impl Middleware for SecurityHeaders {
    fn process(
        &self,
        request: &mut RequestContext,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<()> {
        response.set_header(X_CONTENT_TYPE_OPTIONS, "nosniff")?;
        response.set_header(X_FRAME_OPTIONS, "SAMEORIGIN")?;
        response.set_header(REFERRER_POLICY, "strict-origin-when-cross-origin")?;
        next.run(request, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::MiddlewarePipeline;

    #[test]
    fn test_headers_set_without_fallback() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.pipe(SecurityHeaders);
        let mut response = Response::new();
        pipeline.handle(&mut RequestContext::new(), &mut response).unwrap();

        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[X_FRAME_OPTIONS], "SAMEORIGIN");
        assert!(response.headers().contains_key(REFERRER_POLICY));
    }
}
