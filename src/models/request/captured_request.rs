//! One recorded HTTP request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A captured request as stored in the `requests` table and returned by the API.
///
/// `id` is `0` until the write queue has persisted the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CapturedRequest {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub headers: String,
    pub body: String,
}

impl CapturedRequest {
    /// Build an unpersisted record stamped with the current UTC time.
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        headers: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        CapturedRequest {
            id: 0,
            timestamp: Utc::now(),
            method: method.into(),
            url: url.into(),
            headers: headers.into(),
            body: body.into(),
        }
    }

    /// Return the record carrying the id storage assigned to it.
    pub fn with_id(self, id: i64) -> Self {
        CapturedRequest { id, ..self }
    }
}
