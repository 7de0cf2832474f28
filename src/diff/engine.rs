//! Core diff engine implementation.
//! Combines two stack sources into one signed delta source.

use super::remap::{RemapTable, Side};
use crate::model::{StackSource, StackSourceBuilder};
use crate::utils::error::Cancelled;
use crate::work::CancellationToken;
use log::{debug, info};
use std::convert::Infallible;

// Samples between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Subtract `baseline` from `data`
///
/// # Arguments
/// * `data` - The source whose samples are kept with their sign
/// * `baseline` - The source whose samples are added with negated metric
///
/// # Returns
/// A new source: all data samples, then all baseline samples negated.
/// Neither input is modified.
///
/// # Example
/// ```ignore
/// let delta = diff(&after, &before);
/// let totals = delta.totals_by_path();
/// ```
pub fn diff(data: &StackSource, baseline: &StackSource) -> StackSource {
    match diff_inner(data, baseline, || Ok::<(), Infallible>(())) {
        Ok(source) => source,
        Err(never) => match never {},
    }
}

/// Same as `diff`, checking `cancel` while copying samples
///
/// # Errors
/// * `Cancelled` - The token was cancelled before the diff finished
pub fn diff_cancellable(
    data: &StackSource,
    baseline: &StackSource,
    cancel: &CancellationToken,
) -> Result<StackSource, Cancelled> {
    diff_inner(data, baseline, || cancel.check())
}

fn diff_inner<E>(
    data: &StackSource,
    baseline: &StackSource,
    mut check: impl FnMut() -> Result<(), E>,
) -> Result<StackSource, E> {
    check()?;

    // Step 1: Build the combined interning tables
    let mut builder = StackSourceBuilder::new(diff_name(data, baseline), data.metric_unit());
    let table = RemapTable::build(data, baseline, &mut builder);
    debug!(
        "Remapped {} + {} call paths for diff",
        data.call_paths().len(),
        baseline.call_paths().len()
    );

    // Step 2: Copy samples, data as-is then baseline negated
    for (side, source, sign) in [(Side::Data, data, 1.0), (Side::Baseline, baseline, -1.0)] {
        for (n, sample) in source.samples().iter().enumerate() {
            if n % CANCEL_CHECK_INTERVAL == 0 {
                check()?;
            }
            builder.add_sample(
                table.path(side, sample.call_path),
                sign * sample.metric,
                sample.time_relative_msec,
                sample.process_id,
            );
        }
    }

    info!(
        "Diffed '{}' ({} samples) against '{}' ({} samples)",
        data.name(),
        data.sample_count(),
        baseline.name(),
        baseline.sample_count()
    );
    Ok(builder.build())
}

fn diff_name(data: &StackSource, baseline: &StackSource) -> String {
    format!("{} - {}", data.name(), baseline.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeRange;

    fn source(name: &str, stacks: &[(&[&str], f64)]) -> StackSource {
        let mut builder = StackSourceBuilder::new(name, "msec");
        for (n, (stack, metric)) in stacks.iter().enumerate() {
            builder.add_stack(stack.iter().copied(), *metric, n as f64, None);
        }
        builder.build()
    }

    #[test]
    fn test_sample_order_and_signs() {
        let data = source("after", &[(&["main", "foo"], 10.0)]);
        let baseline = source("before", &[(&["main", "foo"], 4.0)]);
        let delta = diff(&data, &baseline);

        let metrics: Vec<f64> = delta.samples().iter().map(|s| s.metric).collect();
        assert_eq!(metrics, vec![10.0, -4.0]);
        assert_eq!(delta.samples()[0].call_path, delta.samples()[1].call_path);
        assert_eq!(delta.total_metric(TimeRange::ALL), 6.0);
        assert_eq!(delta.name(), "after - before");
    }

    #[test]
    fn test_cancelled_before_start() {
        let data = source("a", &[(&["main"], 1.0)]);
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(diff_cancellable(&data, &data, &token).err(), Some(Cancelled));
    }

    #[test]
    fn test_live_token_matches_plain_diff() {
        let data = source("after", &[(&["main", "foo"], 10.0), (&["main", "bar"], 1.0)]);
        let baseline = source("before", &[(&["main", "foo"], 4.0)]);

        let plain = diff(&data, &baseline);
        let checked = diff_cancellable(&data, &baseline, &CancellationToken::new()).unwrap();
        assert_eq!(plain.sample_count(), 3);
        assert_eq!(checked.sample_count(), plain.sample_count());
        assert_eq!(checked.totals_by_path(), plain.totals_by_path());
    }
}
