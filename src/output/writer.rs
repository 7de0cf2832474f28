//! Save stack sources and heap graphs to disk.
//!
//! Stack sources go to the native `.perfView.json` / `.perfView.xml`
//! documents (picked by suffix); graphs go to `.gcheap`.

use crate::formats::gc_heap::GcHeapWriter;
use crate::formats::native::NativeDocument;
use crate::formats::native_xml;
use crate::formats::ViewState;
use crate::graph::MemoryGraph;
use crate::model::StackSource;
use crate::utils::error::OutputError;
use chrono::Utc;
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Document flavour chosen from the output suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFormat {
    Json,
    Xml,
}

impl NativeFormat {
    pub fn from_path(path: &Path) -> Result<Self, OutputError> {
        let name = path.to_string_lossy().to_lowercase();
        if name.ends_with(".perfview.json") {
            Ok(NativeFormat::Json)
        } else if name.ends_with(".perfview.xml") {
            Ok(NativeFormat::Xml)
        } else {
            Err(OutputError::UnsupportedFormat(format!(
                "{} (expected .perfView.json or .perfView.xml)",
                path.display()
            )))
        }
    }
}

/// Write a stack source and its view state as a native document
///
/// # Arguments
/// * `source` - Stack source to save (folded or diffed sources included)
/// * `view_state` - View state persisted alongside the samples
/// * `output_path` - Destination; the suffix selects JSON or XML
///
/// # Returns
/// Number of bytes written
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
/// * `OutputError::UnsupportedFormat` - Suffix is neither native format
///
/// # Example
/// ```ignore
/// let delta = diff(&data, &baseline);
/// write_stack_source(&delta, &ViewState::default(), "delta.perfView.json")?;
/// ```
pub fn write_stack_source(
    source: &StackSource,
    view_state: &ViewState,
    output_path: impl AsRef<Path>,
) -> Result<u64, OutputError> {
    let output_path = output_path.as_ref();
    info!("Writing stack source '{}' to: {}", source.name(), output_path.display());

    let format = NativeFormat::from_path(output_path)?;
    let mut document = NativeDocument::new(source, view_state);
    document.generated_at = Some(Utc::now().to_rfc3339());

    let mut writer = create_output(output_path)?;
    match format {
        NativeFormat::Json => serde_json::to_writer_pretty(&mut writer, &document)?,
        NativeFormat::Xml => writer.write_all(native_xml::to_xml_string(&document).as_bytes())?,
    }
    writer.flush()?;

    let size = calculate_file_size(output_path);
    info!("Stack source written successfully ({} bytes)", size);
    Ok(size)
}

/// Write a graph as `.gcheap`
pub fn write_graph(graph: &MemoryGraph, output_path: impl AsRef<Path>) -> Result<u64, OutputError> {
    let output_path = output_path.as_ref();
    info!("Writing graph to: {}", output_path.display());

    let writer = create_output(output_path)?;
    GcHeapWriter::new(writer).write_graph(graph)?;

    let size = calculate_file_size(output_path);
    info!("Graph written successfully ({} bytes)", size);
    Ok(size)
}

/// Validate the path, create missing parents and open the file
fn create_output(output_path: &Path) -> Result<BufWriter<File>, OutputError> {
    validate_output_path(output_path)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!("Cannot create directory {}: {}", parent.display(), e))
            })?;
        }
    }

    let file = File::create(output_path)?;
    Ok(BufWriter::new(file))
}

fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

fn calculate_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::native_json::{self, STACKS_STREAM};
    use crate::formats::FormatRegistry;
    use crate::graph::GraphBuilder;
    use crate::model::StackSourceBuilder;
    use tempfile::tempdir;

    fn create_test_source() -> StackSource {
        let mut builder = StackSourceBuilder::new("cpu", "msec");
        builder.add_stack(["app!main", "app!foo"], 10.0, 0.0, Some(4));
        builder.add_stack(["app!main"], 2.0, 1.0, Some(4));
        builder.build()
    }

    #[test]
    fn test_write_json_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.perfView.json");
        let source = create_test_source();

        write_stack_source(&source, &ViewState::with_clr_grouping(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let document = native_json::parse_document(&path, &text).unwrap();
        assert!(document.generated_at.is_some());

        let mut file = FormatRegistry::standard()
            .open(&path, &mut Vec::new())
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(file.default_view_state(), &ViewState::with_clr_grouping());
        let reopened = file
            .open_stream(STACKS_STREAM, &mut Vec::new())
            .unwrap()
            .into_stack()
            .unwrap();
        assert_eq!(reopened.totals_by_path(), source.totals_by_path());
    }

    #[test]
    fn test_write_xml_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested/dirs/run.perfView.xml");

        write_stack_source(&create_test_source(), &ViewState::default(), &nested).unwrap();

        assert!(nested.exists());
        let text = std::fs::read_to_string(&nested).unwrap();
        assert!(text.contains("<StackWindow"));
    }

    #[test]
    fn test_unsupported_suffix() {
        let dir = tempdir().unwrap();
        let err = write_stack_source(
            &create_test_source(),
            &ViewState::default(),
            dir.path().join("run.txt"),
        )
        .unwrap_err();
        assert!(matches!(err, OutputError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_validate_output_path_directory() {
        let dir = tempdir().unwrap();
        assert!(validate_output_path(dir.path()).is_err());
        assert!(validate_output_path(Path::new("")).is_err());
    }

    #[test]
    fn test_write_graph() {
        let mut builder = GraphBuilder::new();
        let t = builder.type_index("T", None);
        let node = builder.create_node();
        builder.set_node(node, t, 12, Vec::new());
        let graph = builder.build().unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.gcheap");
        write_graph(&graph, &path).unwrap();

        let loaded = crate::graph::load(&path, &mut Vec::new()).unwrap();
        assert_eq!(loaded.total_size(), 12);
    }
}
