// src/update/mod.rs
pub mod monthly;
pub mod tcd;

use thiserror::Error;

/// A run must make forward progress or fail explicitly: if no candidate file
/// yields rows, nothing is persisted and the previous dataset stays
/// authoritative.
#[derive(Debug, Error)]
#[error("no parsable files found after download; check source page structure")]
pub struct NoParsableFiles;
