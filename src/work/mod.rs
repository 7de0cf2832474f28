//! Background work scheduling.
//!
//! Long operations (opening files, diffing) run in two phases: a background
//! closure on a worker thread that builds a result, and a completion closure
//! that runs on the foreground thread when it calls `pump`. Results are
//! only handed over whole, never shared while being built.

use crate::utils::error::Cancelled;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once `cancel` has been called
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// How a background job ended
#[derive(Debug)]
pub enum WorkOutcome<T> {
    Completed(T),
    Failed(anyhow::Error),
    Cancelled,
}

impl<T> WorkOutcome<T> {
    fn from_result(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(value) => WorkOutcome::Completed(value),
            Err(error) if error.downcast_ref::<Cancelled>().is_some() => WorkOutcome::Cancelled,
            Err(error) => WorkOutcome::Failed(error),
        }
    }

    /// Collapse into a result, treating cancellation as an error
    pub fn into_result(self) -> anyhow::Result<T> {
        match self {
            WorkOutcome::Completed(value) => Ok(value),
            WorkOutcome::Failed(error) => Err(error),
            WorkOutcome::Cancelled => Err(Cancelled.into()),
        }
    }
}

/// Handle to a started job
#[derive(Debug, Clone)]
pub struct WorkHandle {
    pub id: u64,
    pub description: String,
    token: CancellationToken,
}

impl WorkHandle {
    pub fn cancel(&self) {
        debug!("Cancelling work #{} ({})", self.id, self.description);
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;
type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Fixed worker pool with a single-consumer completion queue
pub struct WorkQueue {
    jobs: Option<Sender<Job>>,
    completions_tx: Sender<Completion>,
    completions_rx: Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,
    next_id: u64,
    pending: usize,
}

impl WorkQueue {
    /// Start `workers` threads (at least one)
    pub fn new(workers: usize) -> Self {
        let (jobs_tx, jobs_rx) = unbounded::<Job>();
        let (completions_tx, completions_rx) = unbounded::<Completion>();

        let workers = (0..workers.max(1))
            .map(|n| {
                let jobs = jobs_rx.clone();
                std::thread::Builder::new()
                    .name(format!("tracelens-worker-{}", n))
                    .spawn(move || {
                        while let Ok(job) = jobs.recv() {
                            job();
                        }
                    })
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("Failed to spawn worker thread: {}", e);
                    None
                }
            })
            .collect();

        Self {
            jobs: Some(jobs_tx),
            completions_tx,
            completions_rx,
            workers,
            next_id: 0,
            pending: 0,
        }
    }

    /// Queue `background` on a worker; `completion` later runs inside `pump`
    pub fn start_work<T, B, C>(&mut self, description: &str, background: B, completion: C) -> WorkHandle
    where
        T: Send + 'static,
        B: FnOnce(&CancellationToken) -> anyhow::Result<T> + Send + 'static,
        C: FnOnce(WorkOutcome<T>) + Send + 'static,
    {
        self.next_id += 1;
        let handle = WorkHandle {
            id: self.next_id,
            description: description.to_string(),
            token: CancellationToken::new(),
        };

        let token = handle.token.clone();
        let completions = self.completions_tx.clone();
        let id = handle.id;
        let job: Job = Box::new(move || {
            let outcome = if token.is_cancelled() {
                WorkOutcome::Cancelled
            } else {
                match panic::catch_unwind(AssertUnwindSafe(|| background(&token))) {
                    Ok(result) => WorkOutcome::from_result(result),
                    Err(_) => WorkOutcome::Failed(anyhow::anyhow!("background work #{} panicked", id)),
                }
            };
            debug!("Work #{} finished in background", id);
            // The receiver lives as long as the queue; a send error means it was dropped.
            let _ = completions.send(Box::new(move || completion(outcome)));
        });

        self.pending += 1;
        match &self.jobs {
            Some(jobs) if jobs.send(job).is_ok() => {}
            _ => {
                warn!("Work queue is shut down; dropping '{}'", description);
                self.pending -= 1;
            }
        }
        handle
    }

    /// Run every completion that is ready; returns how many ran
    pub fn pump(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            completion();
            ran += 1;
        }
        self.pending -= ran;
        ran
    }

    /// Wait up to `timeout` for one completion, then drain the rest
    pub fn pump_blocking(&mut self, timeout: Duration) -> usize {
        match self.completions_rx.recv_timeout(timeout) {
            Ok(completion) => {
                completion();
                self.pending -= 1;
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Pump until no queued job is outstanding
    pub fn wait_all(&mut self) {
        while self.pending > 0 {
            self.pump_blocking(Duration::from_millis(50));
        }
    }

    pub fn pending(&self) -> usize {
        self.pending
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        // Closing the job channel ends each worker loop.
        self.jobs.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
