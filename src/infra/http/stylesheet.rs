use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::application::{CacheCompiler, error::HttpError};

#[derive(Clone)]
pub struct HttpState {
    pub compiler: Arc<CacheCompiler>,
    pub route: String,
}

impl HttpState {
    pub fn new(compiler: CacheCompiler, route: impl Into<String>) -> Self {
        Self {
            compiler: Arc::new(compiler),
            route: route.into(),
        }
    }
}

/// Compile on the blocking pool and answer with the stylesheet or a 304.
pub(super) async fn serve_stylesheet(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Response {
    let compiler = Arc::clone(&state.compiler);
    match tokio::task::spawn_blocking(move || compiler.process(&headers)).await {
        Ok(Ok(response)) => response.into_response(),
        Ok(Err(err)) => HttpError::from(err).into_response(),
        Err(join) => HttpError::from_error(
            "infra::http::serve_stylesheet",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &join,
        )
        .into_response(),
    }
}
