//! Diff command: subtract a baseline stream from a data stream.
//!
//! Both files are opened concurrently on the worker pool, then the delta
//! source is built in the background and summarized as signed hot paths.

use super::models::DiffArgs;
use super::utils::{load_stack, render_hot_paths, Job, LoadedStack, Session};
use crate::aggregator::{absolute_total, build_collapsed_stacks, calculate_hot_paths};
use crate::diff::diff_cancellable;
use crate::model::TimeRange;
use crate::output::write_stack_source;
use crate::work::CancellationToken;
use anyhow::{Context, Result};
use colored::*;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;

/// Execute the diff command
///
/// # Errors
/// * Either file fails to open or has no matching stream
/// * The delta cannot be written to `--output`
pub fn execute_diff(session: &mut Session, args: DiffArgs) -> Result<()> {
    let start_time = Instant::now();
    validate_args(&args)?;

    // Step 1: Open both files concurrently
    info!(
        "Step 1/3: Opening {} and baseline {}...",
        args.data.display(),
        args.baseline.display()
    );
    let jobs: Vec<(String, Job<LoadedStack>)> = [&args.data, &args.baseline]
        .into_iter()
        .map(|path| {
            let path = path.clone();
            let stream = args.stream.clone();
            let description = format!("open {}", path.display());
            let job: Job<LoadedStack> = Box::new(move |_: &CancellationToken| -> Result<LoadedStack> {
                load_stack(&path, stream.as_deref())
            });
            (description, job)
        })
        .collect();
    let mut loaded = session.run_all(jobs)?;
    let baseline = loaded.pop().context("baseline was not loaded")?;
    let data = loaded.pop().context("data was not loaded")?;

    if data.source.metric_unit() != baseline.source.metric_unit() {
        warn!(
            "Metric units differ ({} vs {}); the delta uses {}",
            data.source.metric_unit(),
            baseline.source.metric_unit(),
            data.source.metric_unit()
        );
    }

    // Step 2: Build the delta source
    info!("Step 2/3: Subtracting baseline...");
    let data_source = Arc::clone(&data.source);
    let baseline_source = Arc::clone(&baseline.source);
    let delta = session.run("diff", move |cancel| {
        Ok(diff_cancellable(&data_source, &baseline_source, cancel)?)
    })?;

    // Step 3: Signed hot paths
    info!("Step 3/3: Calculating top {} changed paths...", args.top);
    let stacks = build_collapsed_stacks(&delta, TimeRange::ALL);
    let hot_paths = calculate_hot_paths(&stacks, absolute_total(&stacks), args.top);

    println!(
        "\n{} {} ({}) - {} ({})",
        "Diff:".bold(),
        args.data.display().to_string().cyan(),
        data.stream,
        args.baseline.display().to_string().cyan(),
        baseline.stream
    );
    let net = delta.total_metric(TimeRange::ALL);
    let net_text = format!("{:+.2} {}", net, delta.metric_unit());
    let net_text = if net > 0.0 {
        net_text.red()
    } else if net < 0.0 {
        net_text.green()
    } else {
        net_text.normal()
    };
    println!(
        "Data: {:.2}  Baseline: {:.2}  Net: {}",
        data.source.total_metric(TimeRange::ALL),
        baseline.source.total_metric(TimeRange::ALL),
        net_text
    );
    print!(
        "{}",
        render_hot_paths("Changed Paths", &hot_paths, delta.metric_unit(), true)
    );

    if let Some(output) = &args.output {
        let size = write_stack_source(&delta, &data.view_state, output)
            .with_context(|| format!("Failed to write delta to {}", output.display()))?;
        println!(
            "\n{} {} ({} bytes)",
            "Delta saved:".green(),
            output.display(),
            size
        );
    }

    info!("Diff completed in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Validate diff arguments
pub fn validate_args(args: &DiffArgs) -> Result<()> {
    if args.top == 0 {
        anyhow::bail!("top must be greater than 0");
    }

    if args.top > 1000 {
        anyhow::bail!("top is too large (max 1000)");
    }

    if args.data == args.baseline {
        warn!("Data and baseline are the same file; the delta will be empty");
    }

    Ok(())
}
