//! Error types for the entire library.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening a file or one of its logical streams
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("cannot read {}: {source}", .path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt data in {} (stream '{stream}'): {detail}", .path.display())]
    CorruptData {
        path: PathBuf,
        stream: String,
        detail: String,
    },

    #[error("{}: unsupported {format} version {version}", .path.display())]
    UnsupportedVersion {
        path: PathBuf,
        format: &'static str,
        version: u32,
    },

    #[error("{} has no stream named '{stream}'", .path.display())]
    UnsupportedStream { path: PathBuf, stream: String },

    #[error("no format adapter registered for {}", .0.display())]
    UnknownFormat(PathBuf),

    #[error("{format} does not support {capability}")]
    CapabilityNotSupported {
        format: &'static str,
        capability: &'static str,
    },

    #[error("{}: {source}", .path.display())]
    Graph {
        path: PathBuf,
        #[source]
        source: GraphError,
    },

    #[error(transparent)]
    Symbols(#[from] SymbolError),
}

impl FormatError {
    /// Build a `CorruptData` error for one stream of a file
    pub fn corrupt(
        path: impl Into<PathBuf>,
        stream: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        FormatError::CorruptData {
            path: path.into(),
            stream: stream.into(),
            detail: detail.into(),
        }
    }

    /// Build an `UnreadableFile` error
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FormatError::UnreadableFile {
            path: path.into(),
            source,
        }
    }
}

/// Structural errors in heap/size graph files
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("malformed graph file: {0}")]
    MalformedGraphFile(String),

    #[error("file truncated at offset {offset} (needed {needed} more bytes)")]
    TruncatedFile { offset: usize, needed: usize },

    #[error("unsupported graph file version {0}")]
    UnsupportedVersion(u32),
}

/// Errors at the symbol-resolution boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("symbols unavailable for module {module}")]
    SymbolsUnavailable { module: String },

    #[error("{format} data has been re-serialized; symbol lookup is not supported")]
    SymbolResolutionNotSupported { format: &'static str },
}

/// Errors compiling group/fold patterns
#[derive(Error, Debug)]
pub enum GroupingError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Terminal outcome of a cancelled long-running operation.
///
/// Distinct from every failure type so callers can tell the two apart.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

/// Errors loading the TOML configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
