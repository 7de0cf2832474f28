//! Streams and stacks commands.
//!
//! The stacks command:
//! 1. Opens the file and materializes one stack stream
//! 2. Applies group and fold patterns (view state, config, command line)
//! 3. Builds collapsed stacks and hot paths for the time window
//! 4. Prints the hot paths and the folded call tree

use super::models::StacksArgs;
use super::utils::{load_stack, render_hot_paths, Session};
use crate::aggregator::{absolute_total, build_collapsed_stacks, calculate_distribution, calculate_hot_paths};
use crate::formats::{FormatRegistry, OpenedFile, ViewState};
use crate::model::{CallTree, GroupingRule, TimeRange};
use crate::utils::config::AnalysisConfig;
use anyhow::{Context, Result};
use colored::*;
use log::{debug, info};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// List the format and declared streams of a file
pub fn execute_streams(session: &mut Session, file: PathBuf) -> Result<()> {
    let path = file.clone();
    let opened = session.run(&format!("open {}", file.display()), move |_| {
        FormatRegistry::standard()
            .open(&path, &mut io::stderr())
            .with_context(|| format!("Failed to open {}", path.display()))
    })?;

    println!("{} ({})", file.display().to_string().cyan(), opened.format_name().bold());
    match opened {
        OpenedFile::Data(data) => {
            for descriptor in data.streams() {
                println!("  {:<24} {}", descriptor.name, descriptor.kind);
            }
            if !data.default_view_state().is_default() {
                println!("  default group patterns: {:?}", data.default_view_state().group_patterns);
            }
            if !data.supports_symbol_lookup() {
                println!("  symbol lookup: not supported for saved data");
            }
        }
        OpenedFile::Trigger(trigger) => {
            println!(
                "  no streams; run `capture {}` to produce a heap file",
                trigger.dump_path().display()
            );
        }
    }
    Ok(())
}

/// Execute the stacks command
///
/// # Errors
/// * File open or stream parse failures
/// * Invalid group or fold patterns
pub fn execute_stacks(session: &mut Session, args: StacksArgs) -> Result<()> {
    let start_time = Instant::now();
    validate_args(&args)?;

    // Step 1: Open the stream in the background
    info!("Step 1/4: Opening {}...", args.file.display());
    let file = args.file.clone();
    let stream = args.stream.clone();
    let loaded = session.run(&format!("open {}", args.file.display()), move |_| {
        load_stack(&file, stream.as_deref())
    })?;

    // Step 2: Grouping and folding
    info!("Step 2/4: Applying group and fold patterns...");
    let rule = build_rule(&loaded.view_state, &session.config, &args)?;
    let source = if rule.is_empty() {
        Arc::clone(&loaded.source)
    } else {
        let unfolded = Arc::clone(&loaded.source);
        session.run("fold", move |_| Ok(Arc::new(unfolded.fold(&rule))))?
    };

    // Step 3: Collapsed stacks and hot paths
    info!("Step 3/4: Calculating top {} hot paths...", args.top);
    let range = TimeRange::from_bounds(args.start, args.end);
    let stacks = build_collapsed_stacks(&source, range);
    let distribution = calculate_distribution(&stacks);
    info!("Distribution: {}", distribution.summary());
    let hot_paths = calculate_hot_paths(&stacks, absolute_total(&stacks), args.top);

    // Step 4: Call tree
    info!("Step 4/4: Building call tree...");
    let fold_percent = args.fold_percent.unwrap_or(session.config.fold_percent);
    let tree = CallTree::build(&source, range).fold_below_percent(fold_percent);
    debug!("Call tree has {} nodes after folding", tree.node_count());

    println!(
        "\n{} {} / {} ({})",
        "Stacks:".bold(),
        args.file.display().to_string().cyan(),
        loaded.stream,
        loaded.format_name
    );
    println!(
        "Samples: {}  Total: {:.2} {}",
        source.enumerate(range).count(),
        source.total_metric(range),
        source.metric_unit()
    );
    print!(
        "{}",
        render_hot_paths("Hot Paths", &hot_paths, source.metric_unit(), false)
    );
    print!("{}", render_call_tree(&tree, fold_percent));

    info!("Stacks completed in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Group/fold rule from the file's view state, then config, then command line
pub fn build_rule(
    view_state: &ViewState,
    config: &AnalysisConfig,
    args: &StacksArgs,
) -> Result<GroupingRule> {
    let mut rule = GroupingRule::from_view_state(view_state).context("Invalid saved patterns")?;
    for patterns in &config.group_patterns {
        rule.add_group_patterns(patterns).context("Invalid configured group pattern")?;
    }
    for patterns in &config.fold_patterns {
        rule.add_fold_patterns(patterns).context("Invalid configured fold pattern")?;
    }
    if let Some(patterns) = &args.group {
        rule.add_group_patterns(patterns).context("Invalid --group pattern")?;
    }
    if let Some(patterns) = &args.fold {
        rule.add_fold_patterns(patterns).context("Invalid --fold pattern")?;
    }
    Ok(rule)
}

/// Indented call tree, children in first-seen order
pub fn render_call_tree(tree: &CallTree, fold_percent: f64) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{} (nodes below {}% folded into their caller)\n",
        "Call Tree".bold(),
        fold_percent
    ));
    out.push_str("---------------------------------------------------\n");

    let total = tree.absolute_total();
    let percent = |value: f64| if total > 0.0 { value / total * 100.0 } else { 0.0 };

    // (node index, depth); children pushed in reverse to pop in order
    let mut pending: Vec<(usize, usize)> = tree.children(0).map(|(i, _)| (i, 0)).collect();
    pending.reverse();
    while let Some((index, depth)) = pending.pop() {
        if let Some(node) = tree.node(index) {
            out.push_str(&format!(
                "{}{:>6.1}% {:>6.1}%  {}\n",
                "  ".repeat(depth),
                percent(node.inclusive),
                percent(node.exclusive),
                node.name
            ));
        }
        let children: Vec<usize> = tree.children(index).map(|(i, _)| i).collect();
        pending.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
    }
    out
}

/// Validate stacks arguments
pub fn validate_args(args: &StacksArgs) -> Result<()> {
    if args.top == 0 {
        anyhow::bail!("top must be greater than 0");
    }

    if args.top > 1000 {
        anyhow::bail!("top is too large (max 1000)");
    }

    if let Some(percent) = args.fold_percent {
        if !(0.0..=100.0).contains(&percent) {
            anyhow::bail!("fold-percent must be between 0 and 100");
        }
    }

    if let (Some(start), Some(end)) = (args.start, args.end) {
        if start >= end {
            anyhow::bail!("start ({}) must be before end ({})", start, end);
        }
    }

    Ok(())
}
