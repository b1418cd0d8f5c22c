//! Catch-all handler that records the incoming request.

use crate::{
  app::AppState, models::request::captured_request::CapturedRequest, util::serialize_headers,
};
use axum::{
  body::Bytes,
  extract::{OriginalUri, State},
  http::{HeaderMap, Method},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{debug, error};

/// Persist the request and answer with the stored record, id included.
pub async fn capture_request(
  State(state): State<AppState>,
  method: Method,
  OriginalUri(uri): OriginalUri,
  headers: HeaderMap,
  body: Bytes,
) -> Response {
  let record = CapturedRequest::new(
    method.as_str(),
    uri.to_string(),
    serialize_headers(&headers),
    String::from_utf8_lossy(&body),
  );

  match state.writes.submit(record.clone()).await {
    Ok(id) => {
      debug!(id, method = %record.method, url = %record.url, "captured request");
      Json(record.with_id(id)).into_response()
    }
    Err(e) => {
      error!("capture_request error: {e}");
      e.into_response()
    }
  }
}
