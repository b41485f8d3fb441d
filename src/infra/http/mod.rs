//! HTTP surface: the compiled stylesheet route and a health check.

mod middleware;
mod stylesheet;

pub use middleware::RequestContext;
pub use stylesheet::HttpState;

use axum::{Router, http::StatusCode, middleware as axum_middleware, routing::get};

use self::middleware::trace_server_errors;

pub fn build_router(state: HttpState) -> Router {
    let route = state.route.clone();
    Router::new()
        .route(&route, get(stylesheet::serve_stylesheet))
        .route("/_health", get(health))
        .layer(axum_middleware::from_fn(trace_server_errors))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
