//! Per-request trace continuation, breadcrumb capture, and unhandled-error
//! reporting (spec §4.9), layered as axum middleware ahead of every route.
//! Grounded on `nimbus_observability::trace`/`breadcrumbs`/`capture_error`,
//! which previously had unit tests but no production caller — this module is
//! the request-path wiring that actually drives them.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::RwLock;
use tracing::Instrument;
use uuid::Uuid;

use nimbus_observability::{capture_error, Breadcrumb, BreadcrumbRing, ErrorCapture, ProcessKind, TraceContext};

/// Per-request breadcrumb trail, inserted into request extensions so
/// handlers further down the stack can append their own entries.
pub type SharedBreadcrumbs = Arc<RwLock<BreadcrumbRing>>;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn new_span_id() -> String {
    format!("{:016x}", Uuid::new_v4().as_u128() as u64)
}

/// Parses `traceparent`/`baggage` to continue a distributed trace, opens a
/// `{method} {path}` server span, and threads a bounded breadcrumb ring
/// through request extensions. A response that comes back as a server error
/// is reported through [`capture_error`] with the breadcrumb trail and span
/// context attached — expected `NimbusError` rejections (4xx) are not
/// "unhandled" and are left alone.
pub async fn trace_middleware(mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let trace_ctx = header_str(request.headers(), "traceparent")
        .and_then(|traceparent| TraceContext::parse(traceparent, header_str(request.headers(), "baggage")));
    let span_ctx = trace_ctx.as_ref().map(|ctx| ctx.child_span(new_span_id()));
    let org_id = trace_ctx.as_ref().and_then(|ctx| ctx.baggage.get("org_id").cloned());
    let user_id = trace_ctx.as_ref().and_then(|ctx| ctx.baggage.get("user_id").cloned());

    let breadcrumbs: SharedBreadcrumbs = Arc::new(RwLock::new(BreadcrumbRing::new()));
    breadcrumbs.write().await.push(Breadcrumb::new("request", format!("{method} {path}")));
    request.extensions_mut().insert(breadcrumbs.clone());

    let trace_id = span_ctx.as_ref().map(|ctx| ctx.trace_id.clone()).unwrap_or_default();
    let span = tracing::info_span!("http_request", %method, %path, trace_id);

    let response = next.run(request).instrument(span).await;

    if response.status().is_server_error() {
        breadcrumbs.write().await.push(Breadcrumb::new("response", format!("{} {}", response.status().as_u16(), path)));
        let message = format!("{method} {path} returned {}", response.status());
        let stack_frames = vec![format!("{method} {path} -> {}", response.status())];
        let snapshot = breadcrumbs.read().await.snapshot();
        capture_error(
            ProcessKind::Engine,
            ErrorCapture {
                exception_type: "http_handler_error",
                message: &message,
                stack_frames: &stack_frames,
                breadcrumbs: snapshot,
                span: span_ctx.as_ref(),
                org_id: org_id.as_deref(),
                user_id: user_id.as_deref(),
            },
        );
    }

    response
}
