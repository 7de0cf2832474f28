use tracelens::aggregator::metrics::{absolute_total, calculate_distribution, calculate_hot_paths, create_hot_path};
use tracelens::aggregator::stack_builder::{build_collapsed_stacks, merge_small_stacks, CollapsedStack, OTHER_STACK};
use tracelens::model::{StackSourceBuilder, TimeRange};

#[test]
fn test_collapsed_stacks_from_source() {
    let mut builder = StackSourceBuilder::new("cpu", "msec");
    builder.add_stack(["main", "execute"], 3.0, 0.0, None);
    builder.add_stack(["main", "execute"], 2.0, 1.0, None);
    builder.add_stack(["main", "compute"], 1.0, 2.0, None);
    let source = builder.build();

    let stacks = build_collapsed_stacks(&source, TimeRange::ALL);

    assert_eq!(stacks.len(), 2);
    assert_eq!(stacks[0], CollapsedStack::new("main;execute".to_string(), 5.0));
    assert_eq!(stacks[1].to_line(), "main;compute 1");
}

#[test]
fn test_collapsed_stacks_respect_time_window() {
    let mut builder = StackSourceBuilder::new("cpu", "msec");
    builder.add_stack(["main", "early"], 1.0, 0.0, None);
    builder.add_stack(["main", "late"], 1.0, 10.0, None);
    let source = builder.build();

    let stacks = build_collapsed_stacks(&source, TimeRange::new(5.0, 20.0));
    assert_eq!(stacks.len(), 1);
    assert_eq!(stacks[0].stack, "main;late");
}

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
fn test_signed_hot_paths_use_absolute_total() {
    let stacks = vec![
        CollapsedStack::new("main;foo".to_string(), 6.0),
        CollapsedStack::new("main;bar".to_string(), -2.0),
    ];

    let total = absolute_total(&stacks);
    assert_eq!(total, 8.0);

    let path = create_hot_path(&stacks[1], total);
    assert_eq!(path.percentage, -25.0);
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
    let stacks: Vec<CollapsedStack> = vec![];
    let dist = calculate_distribution(&stacks);
    assert_eq!(dist.total, 0.0);
    assert_eq!(dist.stack_count, 0);
}

#[test]
fn test_merge_small_stacks() {
    let stacks = vec![
        CollapsedStack::new("big".to_string(), 100.0),
        CollapsedStack::new("small1".to_string(), 1.0),
        CollapsedStack::new("small2".to_string(), 2.0),
    ];

    let merged = merge_small_stacks(stacks, 10.0);

    assert_eq!(merged.len(), 2);
    assert!(merged.iter().any(|s| s.stack == OTHER_STACK && s.weight == 3.0));
}
