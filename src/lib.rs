//! subsync-cli library root.
//!
//! This crate implements the subtitle synchronization core: given a
//! candidate SRT track and a speech-accurate reference SRT track, it
//! decides whether and how to re-time the candidate so its captions
//! coincide with the reference.

/// Crate version, as recorded in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;

/// Specialized `Result` type for subsync-cli operations.
pub type Result<T> = error::SubSyncResult<T>;
