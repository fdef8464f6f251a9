//! Core types shared across Corral crates.

pub mod config;
pub mod priority;
pub mod status;

pub use status::CommitStatus;

/// Minimum length of a base-commit hash prefix accepted as a chain seed.
pub const MIN_HASH_PREFIX: usize = 7;

/// Maximum chain traversal depth.
pub const MAX_CHAIN_DEPTH: u32 = 50;
