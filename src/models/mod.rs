//! Typed records shared by the storage and HTTP layers.

pub mod request;
pub mod response;
