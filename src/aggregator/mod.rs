//! Aggregation of stack sources into collapsed stacks and metrics.
//!
//! This module transforms a stack source into:
//! - Collapsed stack format (for flamegraph tools)
//! - Hot path analysis (top consumers, or top changes for a diff)
//! - Metric distribution statistics

pub mod metrics;
pub mod stack_builder;

// Re-export main types and functions
pub use metrics::{
    absolute_total, calculate_distribution, calculate_hot_paths, HotPath, MetricDistribution,
};
pub use stack_builder::{build_collapsed_stacks, merge_small_stacks, CollapsedStack};
