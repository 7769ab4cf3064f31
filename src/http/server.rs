//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the axum router: every path and method goes to one endpoint
//! - Wire up tower-http layers (request ID, trace, timeout, body limit)
//! - Convert each request, run the app on a blocking thread, flush the
//!   buffered response
//! - Persist the session, issue its cookie and delete unclaimed uploads,
//!   even for requests the timeout layer abandoned
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::context::{RequestContext, Session};
use crate::http::request::from_http;
use crate::http::response::Response;
use crate::lifecycle::App;
use crate::observability::metrics;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Content type used when a handler sets none.
const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// HTTP front end for an [`App`].
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            router: Self::build_router(app),
        }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(app: Arc<App>) -> Router {
        let server = app.config().load().settings().server.clone();

        Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(app)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(server.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs)))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The configured router, for embedding or in-process tests.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let service = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// The single endpoint: convert, run the app, flush.
async fn dispatch(State(app): State<Arc<App>>, request: Request<Body>) -> HttpResponse {
    let start = Instant::now();
    let method = request.method().to_string();
    let config = app.config().load_full();
    let settings = config.settings();

    let context = match from_http(request, app.sessions(), settings).await {
        Ok(context) => context,
        Err(e) => {
            let status = e.status();
            warn!(error = %e, status = status.as_u16(), "Rejected request");
            metrics::record_request(&method, status.as_u16(), start);
            return (status, status.canonical_reason().unwrap_or("Bad Request")).into_response();
        }
    };

    // The worker may outlive this future when the timeout layer drops it,
    // so everything that must happen per request happens on the worker.
    let worker = Arc::clone(&app);
    let cookie_name = settings.session.cookie_name.clone();
    let span = tracing::Span::current();
    let joined = tokio::task::spawn_blocking(move || {
        span.in_scope(|| {
            let mut scope = RequestScope::new(context);
            let outcome = worker.run(scope.context_mut());
            let cookie = scope.finish(&cookie_name);
            if let Err(e) = &outcome {
                error!(error = %e, route = scope.context().route(), "Request failed");
            }
            (outcome, cookie)
        })
    })
    .await;

    let response = match joined {
        Ok((Ok(response), cookie)) => flush(response, cookie),
        Ok((Err(_), _)) => internal_error(),
        Err(e) => {
            error!(error = %e, "Request worker panicked");
            internal_error()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

/// Owns a request's context on the worker thread.
///
/// Uploads a handler did not move away are deleted when the scope drops,
/// including when the handler panics.
struct RequestScope {
    context: RequestContext,
}

impl RequestScope {
    fn new(context: RequestContext) -> Self {
        Self { context }
    }

    fn context(&self) -> &RequestContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut RequestContext {
        &mut self.context
    }

    /// Persist the session and build its cookie, if one must be issued.
    fn finish(&self, cookie_name: &str) -> Option<HeaderValue> {
        let session = self.context.session_state();
        session.commit();
        session_cookie(session, cookie_name)
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        for file in self.context.files().values().flatten() {
            if file.is_ok() && std::fs::remove_file(&file.temp_path).is_ok() {
                tracing::debug!(path = %file.temp_path.display(), "Removed unclaimed upload");
            }
        }
    }
}

/// `Set-Cookie` value for a session started by this request, if it holds data.
fn session_cookie(session: &Session, cookie_name: &str) -> Option<HeaderValue> {
    if !session.is_fresh() || session.is_empty() {
        return None;
    }
    let cookie = format!("{cookie_name}={}; Path=/; HttpOnly; SameSite=Lax", session.id());
    match HeaderValue::from_str(&cookie) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(cookie = cookie_name, "Session cookie is not a valid header value");
            None
        }
    }
}

fn flush(response: Response, cookie: Option<HeaderValue>) -> HttpResponse {
    let (status, headers, body) = response.into_parts();
    let mut out = HttpResponse::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    if !out.headers().contains_key(CONTENT_TYPE) {
        out.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    }
    if let Some(cookie) = cookie {
        out.headers_mut().append(SET_COOKIE, cookie);
    }
    out
}

fn internal_error() -> HttpResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
