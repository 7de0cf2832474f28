//! Diff engine for comparing two stack sources.
//!
//! This module provides:
//! - Per-pair frame and call path remapping
//! - Signed delta sources (data minus baseline)

pub mod engine;
pub mod remap;

pub use engine::{diff, diff_cancellable};
pub use remap::{RemapTable, Side};
