//! Captured request listing and clearing.

use crate::{app::AppState, models::response::clear_response::ClearResponse};
use axum::{
  extract::{Query, State},
  response::{IntoResponse, Response},
  Json,
};
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub url: Option<String>,
}

/// List captured requests, newest first, optionally restricted to one exact url.
pub async fn list_requests(
  State(state): State<AppState>,
  Query(params): Query<ListParams>,
) -> Response {
  let url = params.url.unwrap_or_default();
  match state.reader.query_by_url(&url).await {
    Ok(rows) => Json(rows).into_response(),
    Err(e) => {
      error!("list_requests error: {e}");
      e.into_response()
    }
  }
}

/// Delete every captured request. Subscribers are notified by the write queue.
pub async fn clear_requests(State(state): State<AppState>) -> Response {
  match state.writes.clear().await {
    Ok(cleared) => {
      info!("cleared {cleared} request(s)");
      Json(ClearResponse { cleared }).into_response()
    }
    Err(e) => {
      error!("clear_requests error: {e}");
      e.into_response()
    }
  }
}
