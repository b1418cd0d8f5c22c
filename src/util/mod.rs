//! Utility functions: tracing and header serialization.

use axum::http::HeaderMap;
use std::collections::BTreeMap;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize pretty CLI logging.
pub fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let _ = fmt()
    .with_env_filter(filter)
    .with_target(false)
    .pretty()
    .try_init();
}

/// Serialize headers as a JSON object of name to list of values.
///
/// Repeated headers keep their arrival order. Values that are not valid UTF-8
/// are decoded lossily.
pub fn serialize_headers(headers: &HeaderMap) -> String {
  let mut map: BTreeMap<&str, Vec<String>> = BTreeMap::new();
  for (name, value) in headers {
    map
      .entry(name.as_str())
      .or_default()
      .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
  }
  serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
}
