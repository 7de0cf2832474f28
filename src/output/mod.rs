//! Output writers for analysis results.
//!
//! This module handles writing data to disk:
//! - Native stack documents (JSON or XML)
//! - Binary heap graphs

pub mod writer;

// Re-export main functions
pub use writer::{write_graph, write_stack_source, NativeFormat};
