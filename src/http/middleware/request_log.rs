//! Access log (`request_log`).

use std::time::Instant;

use tracing::{info, warn};

use crate::context::RequestContext;
use crate::error::Result;
use crate::http::response::Response;
use crate::pipeline::{Middleware, Next};

/// Logs each request once the rest of the chain has returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLog;

impl Middleware for RequestLog {
    fn process(
        &self,
        request: &mut RequestContext,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<()> {
        let start = Instant::now();
        let result = next.run(request, response);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let method = request.method().unwrap_or("-");

        match &result {
            Ok(()) => info!(
                method,
                route = request.route(),
                status = response.status().as_u16(),
                elapsed_ms,
                "Request handled"
            ),
            Err(e) => warn!(
                method,
                route = request.route(),
                error = %e,
                elapsed_ms,
                "Request failed"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pipeline::{handler_fn, MiddlewarePipeline};

    #[test]
    fn test_passes_result_through() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.pipe(RequestLog).set_fallback(handler_fn(|_, response| {
            response.write("ok");
            Ok(())
        }));
        let mut response = Response::new();
        pipeline.handle(&mut RequestContext::new(), &mut response).unwrap();
        assert_eq!(response.body_text(), "ok");

        let mut failing = MiddlewarePipeline::new();
        failing
            .pipe(RequestLog)
            .set_fallback(handler_fn(|_, _| Err(Error::handler("boom"))));
        let err = failing
            .handle(&mut RequestContext::new(), &mut Response::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
