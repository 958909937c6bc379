//! CLI command implementations.

pub mod analyze;
pub mod canonicalize;
pub mod common;
pub mod graph;
pub mod verify;
pub mod version;
