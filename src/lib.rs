//! Tracelens
//!
//! Offline analysis of saved performance traces and heap snapshots.
//!
//! This crate provides the core implementation for the `tracelens` CLI:
//! - `formats`: adapters that open trace, heap and size files by extension
//! - `model`: interned stack sources, grouping and call trees
//! - `graph`: memory graphs, histograms and reachability
//! - `diff`: signed subtraction of two stack sources
//! - `work`: the background work queue commands run on
//!
//! ## Getting Started
//!
//! ```bash
//! tracelens streams trace.perfView.json
//! tracelens stacks trace.perfView.json --top 10
//! ```

pub mod aggregator;
pub mod commands;
pub mod diff;
pub mod events;
pub mod formats;
pub mod graph;
pub mod model;
pub mod output;
pub mod symbols;
pub mod utils;
pub mod work;
