//! Shared plumbing for the CLI commands.

use crate::aggregator::HotPath;
use crate::formats::{FormatRegistry, StreamKind, ViewState};
use crate::model::StackSource;
use crate::utils::config::AnalysisConfig;
use crate::work::{CancellationToken, WorkOutcome, WorkQueue};
use anyhow::{anyhow, Context, Result};
use colored::*;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Background job as accepted by `Session::run_all`
pub type Job<T> = Box<dyn FnOnce(&CancellationToken) -> Result<T> + Send + 'static>;

/// Configuration plus the worker pool every command runs its heavy work on
pub struct Session {
    pub config: AnalysisConfig,
    queue: WorkQueue,
}

impl Session {
    pub fn new(config: AnalysisConfig) -> Self {
        let queue = WorkQueue::new(config.worker_threads);
        Self { config, queue }
    }

    /// Run one job in the background and wait for its completion
    pub fn run<T, B>(&mut self, description: &str, background: B) -> Result<T>
    where
        T: Send + 'static,
        B: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
    {
        let job: Job<T> = Box::new(background);
        let mut results = self.run_all(vec![(description.to_string(), job)])?;
        results.pop().ok_or_else(|| anyhow!("'{}' produced no result", description))
    }

    /// Run jobs concurrently; results come back in job order
    pub fn run_all<T>(&mut self, jobs: Vec<(String, Job<T>)>) -> Result<Vec<T>>
    where
        T: Send + 'static,
    {
        let slots: Arc<Mutex<Vec<Option<WorkOutcome<T>>>>> =
            Arc::new(Mutex::new((0..jobs.len()).map(|_| None).collect()));
        let descriptions: Vec<String> = jobs.iter().map(|(d, _)| d.clone()).collect();

        for (index, (description, job)) in jobs.into_iter().enumerate() {
            let sink = Arc::clone(&slots);
            self.queue.start_work(&description, job, move |outcome| {
                if let Ok(mut slots) = sink.lock() {
                    slots[index] = Some(outcome);
                }
            });
        }
        self.queue.wait_all();

        let mut slots = slots
            .lock()
            .map_err(|_| anyhow!("background completion panicked"))?;
        let results: Result<Vec<T>> = slots
            .iter_mut()
            .zip(descriptions)
            .map(|(slot, description)| -> Result<T> {
                slot.take()
                    .ok_or_else(|| anyhow!("'{}' never completed", description))?
                    .into_result()
                    .with_context(|| format!("'{}' failed", description))
            })
            .collect();
        results
    }
}

/// A stack stream opened from a file
#[derive(Debug, Clone)]
pub struct LoadedStack {
    pub source: Arc<StackSource>,
    pub view_state: ViewState,
    pub format_name: &'static str,
    pub stream: String,
}

/// Open `path` and materialize `stream`, or its first stack stream.
///
/// Adapter progress goes to stderr.
pub fn load_stack(path: &Path, stream: Option<&str>) -> Result<LoadedStack> {
    let mut log = io::stderr();
    let mut data = FormatRegistry::standard()
        .open(path, &mut log)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .into_data()?;

    let stream = match stream {
        Some(name) => name.to_string(),
        None => data
            .streams()
            .into_iter()
            .find(|descriptor| descriptor.kind == StreamKind::Stack)
            .map(|descriptor| descriptor.name)
            .ok_or_else(|| anyhow!("{} has no stack streams", path.display()))?,
    };

    let source = data
        .open_stream(&stream, &mut log)
        .with_context(|| format!("Failed to read stream '{}'", stream))?
        .into_stack()?;

    Ok(LoadedStack {
        source,
        view_state: data.default_view_state().clone(),
        format_name: data.format_name(),
        stream,
    })
}

/// Keep the two innermost frames of a long stack
pub fn shorten_stack(stack: &str) -> String {
    let parts: Vec<&str> = stack.split(';').collect();
    if parts.len() <= 2 {
        stack.to_string()
    } else {
        format!("...;{};{}", parts[parts.len() - 2], parts[parts.len() - 1])
    }
}

/// Hot path table; positive rows red and negative rows green when `signed`
pub fn render_hot_paths(title: &str, paths: &[HotPath], unit: &str, signed: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", title.bold()));
    out.push_str("---------------------------------------------------\n");

    if paths.is_empty() {
        out.push_str("  (no samples)\n");
        return out;
    }

    for (i, path) in paths.iter().enumerate() {
        let metric = if signed {
            format!("{:+.2} {}", path.metric, unit)
        } else {
            format!("{:.2} {}", path.metric, unit)
        };
        let metric = match (signed, path.metric) {
            (true, m) if m > 0.0 => metric.red(),
            (true, m) if m < 0.0 => metric.green(),
            _ => metric.normal(),
        };
        out.push_str(&format!(
            "{:>3}. {} ({:+.1}%)  {}\n",
            i + 1,
            metric,
            path.percentage,
            shorten_stack(&path.stack)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_stack() {
        assert_eq!(shorten_stack("a;b"), "a;b");
        assert_eq!(shorten_stack("a;b;c;d"), "...;c;d");
    }

    #[test]
    fn test_run_all_keeps_job_order() {
        let mut session = Session::new(AnalysisConfig::default());
        let jobs: Vec<(String, Job<u32>)> = (0..4u32)
            .map(|n| {
                let job: Job<u32> = Box::new(move |_: &CancellationToken| -> Result<u32> { Ok(n * 10) });
                (format!("job {}", n), job)
            })
            .collect();
        assert_eq!(session.run_all(jobs).unwrap(), vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_run_reports_failure() {
        let mut session = Session::new(AnalysisConfig::default());
        let err = session
            .run("broken", |_| -> Result<()> { Err(anyhow!("bad input")) })
            .unwrap_err();
        assert!(format!("{:#}", err).contains("bad input"));
    }
}
