//! HTTP handlers.

pub mod analysis;
pub mod docs;
