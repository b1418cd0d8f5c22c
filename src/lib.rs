//! httpspy library entrypoint.
//!
//! Modules:
//! - `app`: configuration, startup, shared state
//! - `http`: Axum router and handlers
//! - `writer`: single-writer queue in front of storage
//! - `notify`: live-update subscriber hub
//! - `db`: schema and SQLite request log
//! - `models`: typed records used across layers
//! - `error`: storage and write errors
//! - `util`: tracing and header helpers

pub mod app;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod notify;
pub mod util;
pub mod writer;
