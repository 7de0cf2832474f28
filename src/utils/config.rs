//! Configuration and constants for the library and CLI.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::error::ConfigError;

/// Version written into native `.perfView.xml` / `.perfView.json` documents
pub const NATIVE_FORMAT_VERSION: u32 = 1;

/// Magic bytes at the start of every `.gcheap` file
pub const GCHEAP_MAGIC: &[u8; 8] = b"!GCHEAP!";

/// Highest `.gcheap` revision this crate reads and the one it writes
pub const GCHEAP_MAX_VERSION: u32 = 2;

/// Root index value meaning "graph has no root"
pub const GCHEAP_NO_ROOT: u32 = u32::MAX;

// Sentinel frame names for missing or damaged stack data
pub const UNKNOWN_FRAME_NAME: &str = "?";
pub const BROKEN_FRAME_NAME: &str = "BROKEN";

/// Default group pattern seeded first by the heap adapters.
/// Collapses the two framework namespaces into one synthetic bucket.
pub const DEFAULT_CLR_GROUP_PATTERN: &str = "[group CLR] System.*->CLR;Microsoft.*->CLR";

/// Default fold threshold (percent of total metric)
pub const DEFAULT_FOLD_PERCENT: f64 = 1.0;

/// Default number of background worker threads
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Upper bound on worker threads accepted from configuration
pub const MAX_WORKER_THREADS: usize = 64;

/// Analysis configuration, optionally loaded from a TOML file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of background worker threads
    pub worker_threads: usize,

    /// Fold nodes below this percent of the total when printing call trees
    pub fold_percent: f64,

    /// Extra group patterns applied to every stack view
    pub group_patterns: Vec<String>,

    /// Extra fold patterns applied to every stack view
    pub fold_patterns: Vec<String>,

    /// External command used to turn a process dump into a heap file.
    /// `{dump}` and `{output}` are substituted.
    pub heap_capture_command: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            fold_percent: DEFAULT_FOLD_PERCENT,
            group_patterns: Vec::new(),
            fold_patterns: Vec::new(),
            heap_capture_command: None,
        }
    }
}

impl AnalysisConfig {
    /// Check value ranges after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 || self.worker_threads > MAX_WORKER_THREADS {
            return Err(ConfigError::Invalid(format!(
                "worker_threads must be between 1 and {}, got {}",
                MAX_WORKER_THREADS, self.worker_threads
            )));
        }

        if !(0.0..=100.0).contains(&self.fold_percent) {
            return Err(ConfigError::Invalid(format!(
                "fold_percent must be between 0 and 100, got {}",
                self.fold_percent
            )));
        }

        Ok(())
    }
}

/// Load analysis configuration from a TOML file
///
/// # Errors
/// * `ConfigError::Io` - If file cannot be read
/// * `ConfigError::Parse` - If TOML is invalid
/// * `ConfigError::Invalid` - If a value is out of range
///
/// # Example
/// ```ignore
/// let config = load_config("tracelens.toml")?;
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<AnalysisConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: AnalysisConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
