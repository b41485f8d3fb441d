//! Request ids and server-error logging for the stylesheet routes.

use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::error;
use uuid::Uuid;

use crate::application::error::ErrorReport;

/// Per-request id, visible to handlers and attached to the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
}

/// Tag the request with a fresh id and log every 5xx with its error chain.
///
/// Other statuses pass through silently.
pub async fn trace_server_errors(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4(),
    };
    request.extensions_mut().insert(ctx);
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    if status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        log_server_error(&ctx, &method, &path, status, started, report);
    }

    response.extensions_mut().insert(ctx);
    response
}

fn log_server_error(
    ctx: &RequestContext,
    method: &Method,
    path: &str,
    status: StatusCode,
    started: Instant,
    report: Option<ErrorReport>,
) {
    let (source, messages) = report
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unknown", Vec::new()));
    let detail = messages
        .first()
        .map(String::as_str)
        .unwrap_or("no diagnostic available");

    error!(
        target = "stylecache::http::response",
        status = status.as_u16(),
        method = %method,
        path = %path,
        elapsed_ms = started.elapsed().as_millis(),
        source = source,
        detail = detail,
        chain = ?messages,
        request_id = %ctx.request_id,
        "stylesheet request failed",
    );
}
