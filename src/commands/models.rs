use std::path::PathBuf;

/// Arguments for the stacks command
#[derive(Debug, Clone)]
pub struct StacksArgs {
    pub file: PathBuf,

    /// Stream to analyze; the first stack stream when absent
    pub stream: Option<String>,

    /// Closed-open time window in relative milliseconds
    pub start: Option<f64>,
    pub end: Option<f64>,

    /// Extra `;`-separated group patterns
    pub group: Option<String>,

    /// Extra `;`-separated fold patterns
    pub fold: Option<String>,

    /// Call tree fold threshold; the configured default when absent
    pub fold_percent: Option<f64>,

    /// Number of hot paths to print
    pub top: usize,
}

impl Default for StacksArgs {
    fn default() -> Self {
        Self {
            file: PathBuf::new(),
            stream: None,
            start: None,
            end: None,
            group: None,
            fold: None,
            fold_percent: None,
            top: 20,
        }
    }
}

/// Arguments for the diff command
#[derive(Debug, Clone)]
pub struct DiffArgs {
    pub data: PathBuf,
    pub baseline: PathBuf,

    /// Stream to compare in both files
    pub stream: Option<String>,

    pub top: usize,

    /// Save the delta source as `.perfView.json` / `.perfView.xml`
    pub output: Option<PathBuf>,
}

/// Arguments for the heap command
#[derive(Debug, Clone)]
pub struct HeapArgs {
    pub file: PathBuf,

    /// Hide types whose total size is below this many bytes
    pub min_size: u64,

    pub top: usize,

    /// Re-save the graph as `.gcheap`
    pub save: Option<PathBuf>,
}

/// Arguments for the events command
#[derive(Debug, Clone)]
pub struct EventsArgs {
    pub file: PathBuf,

    /// Maximum number of records to print
    pub limit: usize,
}

/// Arguments for the capture command
#[derive(Debug, Clone)]
pub struct CaptureArgs {
    /// Process dump to hand to the capture command
    pub dump: PathBuf,
}
