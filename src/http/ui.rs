//! Watch page and its static assets.

use axum::{
  http::header,
  response::{IntoResponse, Response},
};

const WATCH_HTML: &str = include_str!("assets/watch.html");
const WATCH_JS: &str = include_str!("assets/watch.js");
const WATCH_CSS: &str = include_str!("assets/watch.css");
const FAVICON_SVG: &str = include_str!("assets/favicon.svg");

fn asset(body: &'static str, content_type: &'static str) -> Response {
  (
    [
      (header::CONTENT_TYPE, content_type),
      (header::CACHE_CONTROL, "no-cache"),
    ],
    body,
  )
    .into_response()
}

pub async fn watch_page() -> Response {
  asset(WATCH_HTML, "text/html; charset=utf-8")
}

pub async fn watch_js() -> Response {
  asset(WATCH_JS, "text/javascript; charset=utf-8")
}

pub async fn watch_css() -> Response {
  asset(WATCH_CSS, "text/css; charset=utf-8")
}

pub async fn favicon() -> Response {
  asset(FAVICON_SVG, "image/svg+xml")
}
