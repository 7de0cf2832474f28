//! Capture command implementation.
//!
//! The capture command:
//! 1. Opens the process dump, which only yields a capture trigger
//! 2. Builds the configured heap-capture command
//! 3. Fires the trigger and reports the produced heap file

use super::models::CaptureArgs;
use super::utils::Session;
use crate::formats::{CommandCapture, FormatRegistry};
use anyhow::{Context, Result};
use colored::*;
use log::info;
use std::io;
use std::time::Instant;

/// Execute the capture command
///
/// # Errors
/// * The file is not a process dump
/// * No `heap_capture_command` is configured
/// * The capture command fails
pub fn execute_capture(session: &mut Session, args: CaptureArgs) -> Result<()> {
    let start_time = Instant::now();

    // Step 1: Open the dump
    info!("Step 1/3: Opening {}...", args.dump.display());
    let trigger = FormatRegistry::standard()
        .open(&args.dump, &mut io::stderr())
        .with_context(|| format!("Failed to open {}", args.dump.display()))?
        .into_trigger()?;

    // Step 2: Resolve the capture command
    info!("Step 2/3: Resolving heap capture command...");
    let action = CommandCapture::from_config(&session.config, trigger.dump_path()).context(
        "No heap_capture_command configured; set it in the config file to capture heaps",
    )?;

    // Step 3: Run it in the background
    info!("Step 3/3: Running {}...", action.command);
    let produced = session.run("capture heap", move |_| {
        trigger
            .fire(&action, &mut io::stderr())
            .context("Heap capture failed")
    })?;

    match produced {
        Some(heap) => println!("{} {}", "Heap captured:".green(), heap.display()),
        None => println!("{}", "Capture finished without producing a heap file".yellow()),
    }

    info!("Capture completed in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}
