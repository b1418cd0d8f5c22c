//! HTTP router and handlers.

use crate::app::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod capture;
pub mod requests;
pub mod stream;
pub mod ui;

/// Assemble the HTTP router. Anything not claimed by a named route is captured.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/favicon.ico", get(ui::favicon))
        .route("/watch", get(ui::watch_page))
        .route("/watch.js", get(ui::watch_js))
        .route("/watch.css", get(ui::watch_css))
        .route("/requests", get(requests::list_requests))
        .route(
            "/clear",
            post(requests::clear_requests).delete(requests::clear_requests),
        )
        .route("/SSEUpdate", get(stream::sse_update))
        .fallback(capture::capture_request)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
