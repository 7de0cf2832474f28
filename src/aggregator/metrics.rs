//! Hot paths and metric distribution over collapsed stacks.
//!
//! Hot paths are the call paths with the largest absolute weight. For a
//! diff they are the biggest regressions and improvements alike.

use super::stack_builder::CollapsedStack;
use log::debug;
use serde::Serialize;

/// One ranked call path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotPath {
    pub stack: String,
    pub metric: f64,
    /// Share of the reference total, signed like `metric`
    pub percentage: f64,
}

/// Calculate hot paths from collapsed stacks
///
/// # Arguments
/// * `stacks` - Collapsed stacks from stack_builder, already ranked
/// * `total` - Reference total for percentages (the source's absolute total)
/// * `top_n` - Number of paths to return
///
/// # Returns
/// Vector of hot paths in ranking order
pub fn calculate_hot_paths(stacks: &[CollapsedStack], total: f64, top_n: usize) -> Vec<HotPath> {
    debug!("Calculating top {} hot paths from {} stacks", top_n, stacks.len());

    stacks
        .iter()
        .take(top_n)
        .map(|stack| create_hot_path(stack, total))
        .collect()
}

pub fn create_hot_path(stack: &CollapsedStack, total: f64) -> HotPath {
    let percentage = if total != 0.0 {
        (stack.weight / total) * 100.0
    } else {
        0.0
    };

    HotPath {
        stack: stack.stack.clone(),
        metric: stack.weight,
        percentage,
    }
}

/// Sum of absolute weights; the natural percentage base for diffs
pub fn absolute_total(stacks: &[CollapsedStack]) -> f64 {
    stacks.iter().map(|stack| stack.weight.abs()).sum()
}

/// Calculate distribution statistics
///
/// # Arguments
/// * `stacks` - Collapsed stacks, ranked by absolute weight
pub fn calculate_distribution(stacks: &[CollapsedStack]) -> MetricDistribution {
    if stacks.is_empty() {
        return MetricDistribution::default();
    }

    let total: f64 = stacks.iter().map(|s| s.weight).sum();
    let absolute = absolute_total(stacks);
    let count = stacks.len();
    let mean = total / count as f64;

    let mut weights: Vec<f64> = stacks.iter().map(|s| s.weight).collect();
    weights.sort_unstable_by(f64::total_cmp);
    let median = weights[weights.len() / 2];

    // Top 10% of stacks by absolute weight
    let top_10_percent_count = (count as f64 * 0.1).ceil() as usize;
    let top_10_percent_metric: f64 = stacks
        .iter()
        .take(top_10_percent_count)
        .map(|s| s.weight.abs())
        .sum();

    MetricDistribution {
        total,
        stack_count: count,
        mean_per_stack: mean,
        median_per_stack: median,
        top_10_percent_metric,
        top_10_percent_percentage: if absolute > 0.0 {
            (top_10_percent_metric / absolute) * 100.0
        } else {
            0.0
        },
    }
}

/// Metric distribution statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricDistribution {
    /// Signed sum across all stacks
    pub total: f64,

    /// Number of unique stacks
    pub stack_count: usize,

    pub mean_per_stack: f64,

    pub median_per_stack: f64,

    /// Absolute metric of the top 10% of stacks
    pub top_10_percent_metric: f64,

    /// Share of the absolute total held by the top 10%
    pub top_10_percent_percentage: f64,
}

impl MetricDistribution {
    /// True if the top 10% of stacks hold more than 80% of the metric
    pub fn is_highly_concentrated(&self) -> bool {
        self.top_10_percent_percentage > 80.0
    }

    pub fn summary(&self) -> String {
        format!(
            "Total: {:.2} | Stacks: {} | Mean: {:.2} | Median: {:.2} | Top 10%: {:.1}%",
            self.total,
            self.stack_count,
            self.mean_per_stack,
            self.median_per_stack,
            self.top_10_percent_percentage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_hot_paths() {
        let stacks = vec![
            CollapsedStack::new("main;execute".to_string(), 5000.0),
            CollapsedStack::new("main;storage".to_string(), 3000.0),
            CollapsedStack::new("main;compute".to_string(), 2000.0),
        ];

        let hot_paths = calculate_hot_paths(&stacks, 10000.0, 2);

        assert_eq!(hot_paths.len(), 2);
        assert_eq!(hot_paths[0].stack, "main;execute");
        assert_eq!(hot_paths[0].metric, 5000.0);
        assert_eq!(hot_paths[0].percentage, 50.0);
    }

    #[test]
    fn test_create_hot_path_negative() {
        let stack = CollapsedStack::new("test;path".to_string(), -2500.0);
        let hot_path = create_hot_path(&stack, 10000.0);
        assert_eq!(hot_path.percentage, -25.0);
    }

    #[test]
    fn test_calculate_distribution() {
        let stacks = vec![
            CollapsedStack::new("stack1".to_string(), 8500.0),
            CollapsedStack::new("stack2".to_string(), 1000.0),
            CollapsedStack::new("stack3".to_string(), 250.0),
            CollapsedStack::new("stack4".to_string(), 250.0),
        ];

        let dist = calculate_distribution(&stacks);

        assert_eq!(dist.total, 10000.0);
        assert_eq!(dist.stack_count, 4);
        assert_eq!(dist.mean_per_stack, 2500.0);
        assert!(dist.is_highly_concentrated());
    }

    #[test]
    fn test_distribution_empty() {
        let dist = calculate_distribution(&[]);
        assert_eq!(dist.total, 0.0);
        assert_eq!(dist.stack_count, 0);
    }
}
