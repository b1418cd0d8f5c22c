//! Error types shared by the storage, writer and HTTP layers.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

/// A query or mutation against the request log failed.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct StorageError(#[from] pub sqlx::Error);

/// The `requests` table could not be created at startup.
#[derive(Debug, Error)]
#[error("failed to create request schema: {0}")]
pub struct SchemaError(#[source] pub sqlx::Error);

/// Outcome of a job handed to the write queue.
#[derive(Debug, Error)]
pub enum WriteError {
  #[error(transparent)]
  Storage(#[from] StorageError),
  #[error("write queue is closed")]
  Closed,
  #[error("no reply from the write queue after {0:?}")]
  Timeout(Duration),
}

impl WriteError {
  pub fn status(&self) -> StatusCode {
    match self {
      WriteError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
      WriteError::Closed => StatusCode::SERVICE_UNAVAILABLE,
      WriteError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
  }
}

impl IntoResponse for StorageError {
  fn into_response(self) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{self}\n")).into_response()
  }
}

impl IntoResponse for WriteError {
  fn into_response(self) -> Response {
    (self.status(), format!("{self}\n")).into_response()
  }
}
