//! Core synchronization engine for subsync-cli.
//!
//! Implements the three tightly coupled subsystems from spec.md §1:
//! - [`caption`] — SRT parsing, repair, ad detection/purge, serialization.
//! - [`regression`] — ordinary least squares with diagnostics.
//! - [`phrase`] — temporally anchored word extraction and phrase
//!   correlation between a candidate and a reference caption list.
//! - [`rift`] — piecewise segmentation search for abrupt offset breaks.
//! - [`sync`] — the synchronizer that ties it together and picks a winner.
//! - [`compare`] — a non-adjusting, report-only comparator.
//! - [`cache_paths`] — pure helpers for the cache filesystem layout of
//!   spec.md §6 (naming only; no I/O).

pub mod cache_paths;
pub mod caption;
pub mod compare;
pub mod phrase;
pub mod regression;
pub mod rift;
pub mod sync;
