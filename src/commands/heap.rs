//! Heap command: per-type histogram and root reachability of a graph stream.

use super::models::HeapArgs;
use super::utils::Session;
use crate::graph::{self, reachable_from_root, Reachability, TypeHistogramEntry};
use crate::output::write_graph;
use anyhow::{Context, Result};
use colored::*;
use log::info;
use std::io;
use std::sync::Arc;
use std::time::Instant;

/// Execute the heap command
///
/// # Errors
/// * The file has no graph stream or fails to parse
/// * The graph cannot be saved to `--save`
pub fn execute_heap(session: &mut Session, args: HeapArgs) -> Result<()> {
    let start_time = Instant::now();
    validate_args(&args)?;

    // Step 1: Load the graph
    info!("Step 1/3: Loading graph from {}...", args.file.display());
    let file = args.file.clone();
    let heap = session.run(&format!("load {}", args.file.display()), move |_| {
        graph::load(&file, &mut io::stderr())
            .map(Arc::new)
            .with_context(|| format!("Failed to load graph from {}", file.display()))
    })?;

    // Step 2: Histogram and reachability
    info!("Step 2/3: Building type histogram...");
    let min_size = args.min_size;
    let shared = Arc::clone(&heap);
    let (histogram, reachability) = session.run("histogram", move |cancel| {
        let histogram = shared.histogram_by_type_cancellable(min_size, cancel)?;
        let reachability = reachable_from_root(&shared, cancel)?;
        Ok((histogram, reachability))
    })?;

    // Step 3: Report
    info!("Step 3/3: Generating report...");
    println!(
        "\n{} {}",
        "Heap:".bold(),
        args.file.display().to_string().cyan()
    );
    println!(
        "Nodes: {}  Types: {}  References: {}  Total: {} bytes",
        heap.node_index_limit(),
        heap.type_index_limit(),
        heap.total_reference_count(),
        heap.total_size()
    );
    println!("{}", describe_reachability(reachability, heap.total_size()));
    print!("{}", render_histogram(&histogram, args.top, heap.total_size()));

    if let Some(save) = &args.save {
        let size = write_graph(&heap, save)
            .with_context(|| format!("Failed to save graph to {}", save.display()))?;
        println!("\n{} {} ({} bytes)", "Graph saved:".green(), save.display(), size);
    }

    info!("Heap completed in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Validate heap arguments
pub fn validate_args(args: &HeapArgs) -> Result<()> {
    if args.top == 0 {
        anyhow::bail!("top must be greater than 0");
    }

    if let Some(save) = &args.save {
        if !save.to_string_lossy().to_lowercase().ends_with(".gcheap") {
            anyhow::bail!("--save expects a .gcheap path, got {}", save.display());
        }
    }

    Ok(())
}

fn describe_reachability(reachability: Option<Reachability>, total_size: u64) -> String {
    match reachability {
        Some(reached) => {
            let percent = if total_size > 0 {
                reached.total_size as f64 / total_size as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "Reachable from root: {} nodes, {} bytes ({:.1}%)",
                reached.node_count, reached.total_size, percent
            )
        }
        None => "Reachable from root: graph has no root".yellow().to_string(),
    }
}

/// Top `top` histogram rows with their share of the total size
pub fn render_histogram(entries: &[TypeHistogramEntry], top: usize, total_size: u64) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", "Types by Size".bold()));
    out.push_str("---------------------------------------------------\n");

    if entries.is_empty() {
        out.push_str("  (no types above the size threshold)\n");
        return out;
    }

    for (i, entry) in entries.iter().take(top).enumerate() {
        let percent = if total_size > 0 {
            entry.total_size as f64 / total_size as f64 * 100.0
        } else {
            0.0
        };
        out.push_str(&format!(
            "{:>3}. {:>12} bytes {:>5.1}% {:>8} objects  {}\n",
            i + 1,
            entry.total_size,
            percent,
            entry.count,
            entry.type_name
        ));
    }

    if entries.len() > top {
        out.push_str(&format!("  ... {} more types\n", entries.len() - top));
    }
    out
}
