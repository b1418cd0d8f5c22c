//! Response body for the clear endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: u64,
}
