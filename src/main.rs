//! Tracelens CLI
//!
//! Opens saved performance traces and heap snapshots, prints hot paths,
//! diffs two runs and summarizes heap graphs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::debug;
use std::path::PathBuf;

use tracelens::commands::{
    execute_capture, execute_diff, execute_events, execute_heap, execute_stacks, execute_streams,
    CaptureArgs, DiffArgs, EventsArgs, HeapArgs, Session, StacksArgs,
};
use tracelens::utils::config::{load_config, AnalysisConfig};

/// Tracelens - offline trace and heap analysis
#[derive(Parser, Debug)]
#[command(name = "tracelens")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "TRACELENS_CONFIG")]
    config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// List the format and streams of a file
    Streams {
        /// File to inspect
        file: PathBuf,
    },

    /// Print hot paths and the call tree of a stack stream
    Stacks {
        /// File to analyze
        file: PathBuf,

        /// Stream name (defaults to the first stack stream)
        #[arg(short, long)]
        stream: Option<String>,

        /// Window start in relative milliseconds (inclusive)
        #[arg(long)]
        start: Option<f64>,

        /// Window end in relative milliseconds (exclusive)
        #[arg(long)]
        end: Option<f64>,

        /// Extra group patterns, `;`-separated (`pattern->group`)
        #[arg(long)]
        group: Option<String>,

        /// Extra fold patterns, `;`-separated
        #[arg(long)]
        fold: Option<String>,

        /// Fold call tree nodes below this percent of the total
        #[arg(long)]
        fold_percent: Option<f64>,

        /// Number of hot paths to print
        #[arg(long, default_value = "20")]
        top: usize,
    },

    /// Subtract a baseline stream from a data stream
    Diff {
        /// File with the new data
        data: PathBuf,

        /// File with the baseline data
        baseline: PathBuf,

        /// Stream name in both files
        #[arg(short, long)]
        stream: Option<String>,

        /// Number of changed paths to print
        #[arg(long, default_value = "20")]
        top: usize,

        /// Save the delta as .perfView.json or .perfView.xml
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the per-type histogram of a heap or size graph
    Heap {
        /// File to analyze
        file: PathBuf,

        /// Hide types smaller than this many bytes in total
        #[arg(long, default_value = "0")]
        min_size: u64,

        /// Number of types to print
        #[arg(long, default_value = "20")]
        top: usize,

        /// Re-save the graph as .gcheap
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Print the records of an event stream
    Events {
        /// File to read
        file: PathBuf,

        /// Maximum number of records to print
        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// Capture a heap file from a process dump using the configured command
    Capture {
        /// Process dump (.dmp)
        dump: PathBuf,
    },
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    debug!("Using {} worker threads", config.worker_threads);
    let mut session = Session::new(config);

    // Execute command
    match cli.command {
        Commands::Streams { file } => execute_streams(&mut session, file)?,

        Commands::Stacks {
            file,
            stream,
            start,
            end,
            group,
            fold,
            fold_percent,
            top,
        } => {
            let args = StacksArgs {
                file,
                stream,
                start,
                end,
                group,
                fold,
                fold_percent,
                top,
            };
            execute_stacks(&mut session, args)?;
        }

        Commands::Diff {
            data,
            baseline,
            stream,
            top,
            output,
        } => {
            let args = DiffArgs {
                data,
                baseline,
                stream,
                top,
                output,
            };
            execute_diff(&mut session, args)?;
        }

        Commands::Heap {
            file,
            min_size,
            top,
            save,
        } => {
            let args = HeapArgs {
                file,
                min_size,
                top,
                save,
            };
            execute_heap(&mut session, args)?;
        }

        Commands::Events { file, limit } => {
            execute_events(&mut session, EventsArgs { file, limit })?;
        }

        Commands::Capture { dump } => {
            execute_capture(&mut session, CaptureArgs { dump })?;
        }
    }

    Ok(())
}
