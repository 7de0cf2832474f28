use pretty_assertions::assert_eq;
use tracelens::diff::{diff, diff_cancellable};
use tracelens::formats::native_json::to_json_string;
use tracelens::formats::ViewState;
use tracelens::model::{StackSource, StackSourceBuilder, TimeRange};
use tracelens::utils::error::Cancelled;
use tracelens::work::CancellationToken;

fn path(frames: &[&str]) -> Vec<String> {
    frames.iter().map(|f| f.to_string()).collect()
}

fn after() -> StackSource {
    let mut builder = StackSourceBuilder::new("after", "msec");
    builder.add_stack(["main", "foo"], 10.0, 0.0, Some(1));
    builder.add_stack(["main", "baz"], 1.0, 2.0, Some(1));
    builder.build()
}

fn before() -> StackSource {
    let mut builder = StackSourceBuilder::new("before", "msec");
    builder.add_stack(["main", "bar"], 2.0, 0.0, Some(2));
    builder.add_stack(["main", "foo"], 4.0, 1.0, Some(2));
    builder.build()
}

#[test]
fn test_diff_subtracts_shared_paths() {
    let delta = diff(&after(), &before());
    let totals = delta.totals_by_path();

    assert_eq!(totals[&path(&["main", "foo"])], 6.0);
    assert_eq!(totals[&path(&["main", "bar"])], -2.0);
    assert_eq!(totals[&path(&["main", "baz"])], 1.0);
    assert_eq!(delta.total_metric(TimeRange::ALL), 5.0);
}

#[test]
fn test_diff_keeps_every_sample() {
    let data = after();
    let baseline = before();
    let delta = diff(&data, &baseline);

    assert_eq!(delta.sample_count(), data.sample_count() + baseline.sample_count());
    // Inputs are untouched
    assert_eq!(data.total_metric(TimeRange::ALL), 11.0);
    assert_eq!(baseline.total_metric(TimeRange::ALL), 6.0);
}

#[test]
fn test_self_diff_aggregates_to_zero() {
    let source = after();
    let delta = diff(&source, &source);

    for (frames, total) in delta.totals_by_path() {
        assert_eq!(total, 0.0, "path {:?} did not cancel", frames);
    }
}

#[test]
fn test_diff_is_antisymmetric() {
    let forward = diff(&after(), &before()).totals_by_path();
    let backward = diff(&before(), &after()).totals_by_path();

    assert_ne!(forward, backward);
    for (frames, total) in &forward {
        assert_eq!(backward[frames], -total);
    }
}

#[test]
fn test_diff_is_deterministic() {
    let first = to_json_string(&diff(&after(), &before()), &ViewState::default()).unwrap();
    let second = to_json_string(&diff(&after(), &before()), &ViewState::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_cancelled_diff_reports_cancelled() {
    let token = CancellationToken::new();
    token.cancel();

    let result = diff_cancellable(&after(), &before(), &token);
    assert_eq!(result.err(), Some(Cancelled));
}
