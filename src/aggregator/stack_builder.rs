//! Build collapsed stack format from a stack source.
//!
//! Format: "root;caller;leaf weight"
//!
//! Example: "app!main;app!Parse;ntdll!Alloc 12.5"
//! This means: main called Parse which called Alloc, accounting for 12.5
//! units of the source's metric.

use crate::model::{CallPathId, StackSource, TimeRange};
use log::debug;
use std::collections::HashMap;

/// Label used for stacks merged by `merge_small_stacks`
pub const OTHER_STACK: &str = "other";

/// A single collapsed stack entry
#[derive(Debug, Clone, PartialEq)]
pub struct CollapsedStack {
    /// Stack trace as semicolon-separated display names, root first
    pub stack: String,

    /// Summed metric; negative for baseline-dominated diff paths
    pub weight: f64,
}

impl CollapsedStack {
    pub fn new(stack: String, weight: f64) -> Self {
        Self { stack, weight }
    }

    /// `stack weight`, the line format flamegraph tools consume
    pub fn to_line(&self) -> String {
        format!("{} {}", self.stack, self.weight)
    }
}

/// Build collapsed stacks from the samples of `source` inside `range`
///
/// # Arguments
/// * `source` - Stack source, possibly folded or diffed
/// * `range` - Closed-open time window to aggregate
///
/// # Returns
/// One entry per distinct display path, ordered by absolute weight
/// (descending), then by stack text
///
/// # Algorithm
/// 1. Sum sample metrics per call path id
/// 2. Render each path's display names root first
/// 3. Merge ids that render to the same text (e.g. after folding)
/// 4. Sort for stable output
pub fn build_collapsed_stacks(source: &StackSource, range: TimeRange) -> Vec<CollapsedStack> {
    debug!(
        "Building collapsed stacks from {} samples of '{}'",
        source.sample_count(),
        source.name()
    );

    let mut per_path: HashMap<CallPathId, f64> = HashMap::new();
    for sample in source.enumerate(range) {
        *per_path.entry(sample.call_path).or_insert(0.0) += sample.metric;
    }

    let mut stack_map: HashMap<String, f64> = HashMap::new();
    for (path, weight) in per_path {
        *stack_map.entry(source.path_names(path).join(";")).or_insert(0.0) += weight;
    }

    let mut stacks: Vec<CollapsedStack> = stack_map
        .into_iter()
        .map(|(stack, weight)| CollapsedStack::new(stack, weight))
        .collect();
    stacks.sort_by(|a, b| {
        b.weight
            .abs()
            .total_cmp(&a.weight.abs())
            .then_with(|| a.stack.cmp(&b.stack))
    });

    debug!("Built {} unique collapsed stacks", stacks.len());
    stacks
}

/// Merge every stack whose absolute weight is below `threshold` into one `other` entry
pub fn merge_small_stacks(stacks: Vec<CollapsedStack>, threshold: f64) -> Vec<CollapsedStack> {
    let (mut kept, small): (Vec<_>, Vec<_>) = stacks
        .into_iter()
        .partition(|stack| stack.weight.abs() >= threshold);

    if !small.is_empty() {
        let weight = small.iter().map(|stack| stack.weight).sum();
        kept.push(CollapsedStack::new(OTHER_STACK.to_string(), weight));
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StackSourceBuilder;

    #[test]
    fn test_collapsed_stack_to_line() {
        let stack = CollapsedStack::new("main;execute;read".to_string(), 1000.0);
        assert_eq!(stack.to_line(), "main;execute;read 1000");
    }

    #[test]
    fn test_build_sums_same_path() {
        let mut builder = StackSourceBuilder::new("cpu", "msec");
        builder.add_stack(["app!main", "app!foo"].into_iter(), 2.0, 0.0, None);
        builder.add_stack(["app!main", "app!foo"].into_iter(), 3.0, 1.0, None);
        builder.add_stack(["app!main"].into_iter(), 1.0, 2.0, None);
        let source = builder.build();

        let stacks = build_collapsed_stacks(&source, TimeRange::ALL);
        assert_eq!(stacks.len(), 2);
        assert_eq!(stacks[0], CollapsedStack::new("app!main;app!foo".to_string(), 5.0));

        let windowed = build_collapsed_stacks(&source, TimeRange::new(1.0, 2.0));
        assert_eq!(windowed, vec![CollapsedStack::new("app!main;app!foo".to_string(), 3.0)]);
    }

    #[test]
    fn test_merge_small_stacks() {
        let stacks = vec![
            CollapsedStack::new("big_stack".to_string(), 1000.0),
            CollapsedStack::new("small_stack_1".to_string(), 10.0),
            CollapsedStack::new("small_stack_2".to_string(), 15.0),
            CollapsedStack::new("medium_stack".to_string(), -500.0),
        ];

        let merged = merge_small_stacks(stacks, 100.0);

        // big_stack, medium_stack, other
        assert_eq!(merged.len(), 3);
        let other = merged.iter().find(|s| s.stack == OTHER_STACK).unwrap();
        assert_eq!(other.weight, 25.0);
    }
}
