//! Extension-based adapter dispatch.

use super::adapter::{FormatAdapter, OpenedFile};
use super::alloc_stacks::AllocStacksAdapter;
use super::clr_profiler::ClrProfilerAdapter;
use super::code_size::CodeSizeAdapter;
use super::csv_trace::CsvTraceAdapter;
use super::debugger_stack::DebuggerStackAdapter;
use super::gc_heap::GcHeapAdapter;
use super::image_size::ImageSizeAdapter;
use super::native_json::NativeJsonAdapter;
use super::native_xml::NativeXmlAdapter;
use super::off_tree::OffTreeAdapter;
use super::process_dump::ProcessDumpAdapter;
use super::tree_xml::TreeXmlAdapter;
use super::wt_trace::WtTraceAdapter;
use crate::utils::error::FormatError;
use log::{debug, info};
use std::io::Write;
use std::path::Path;

/// Ordered set of format adapters
#[derive(Default)]
pub struct FormatRegistry {
    adapters: Vec<Box<dyn FormatAdapter>>,
}

impl FormatRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CsvTraceAdapter));
        registry.register(Box::new(AllocStacksAdapter));
        registry.register(Box::new(CodeSizeAdapter));
        registry.register(Box::new(GcHeapAdapter));
        registry.register(Box::new(ClrProfilerAdapter));
        registry.register(Box::new(DebuggerStackAdapter));
        registry.register(Box::new(OffTreeAdapter));
        registry.register(Box::new(ImageSizeAdapter));
        registry.register(Box::new(WtTraceAdapter));
        registry.register(Box::new(NativeXmlAdapter));
        registry.register(Box::new(NativeJsonAdapter));
        registry.register(Box::new(TreeXmlAdapter));
        registry.register(Box::new(ProcessDumpAdapter));
        registry
    }

    pub fn register(&mut self, adapter: Box<dyn FormatAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn adapters(&self) -> impl Iterator<Item = &dyn FormatAdapter> + '_ {
        self.adapters.iter().map(|adapter| adapter.as_ref())
    }

    /// Adapter claiming the longest suffix of `path`, compared case-insensitively.
    ///
    /// On equal suffix length the adapter registered first wins.
    pub fn find(&self, path: &Path) -> Option<&dyn FormatAdapter> {
        let file_name = path.file_name()?.to_string_lossy().to_lowercase();

        let mut best: Option<(usize, &dyn FormatAdapter)> = None;
        for adapter in &self.adapters {
            for extension in adapter.file_extensions() {
                let extension = extension.to_lowercase();
                if !file_name.ends_with(&extension) {
                    continue;
                }
                if best.map_or(true, |(len, _)| extension.len() > len) {
                    best = Some((extension.len(), adapter.as_ref()));
                }
            }
        }
        best.map(|(_, adapter)| adapter)
    }

    /// Open `path` with the adapter `find` selects
    ///
    /// # Errors
    /// * `FormatError::UnknownFormat` - no adapter claims the path
    /// * Anything the selected adapter reports
    pub fn open(&self, path: &Path, log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let adapter = self
            .find(path)
            .ok_or_else(|| FormatError::UnknownFormat(path.to_path_buf()))?;

        debug!("Opening {} as {}", path.display(), adapter.format_name());
        let opened = adapter.open(path, log)?;
        info!("Opened {} ({})", path.display(), opened.format_name());
        Ok(opened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{DataFile, StreamDescriptor, StreamKind};
    use crate::formats::adapter::LogicalStream;

    struct XmlZipAdapter;

    impl FormatAdapter for XmlZipAdapter {
        fn format_name(&self) -> &'static str {
            "Any Zipped XML"
        }

        fn file_extensions(&self) -> &'static [&'static str] {
            &[".xml.zip"]
        }

        fn open(&self, path: &Path, _log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
            Ok(OpenedFile::Data(DataFile::new(
                path,
                self.format_name(),
                vec![StreamDescriptor::new("Empty", StreamKind::Events)],
                Box::new(|_: &str, _: &mut dyn Write| {
                    Ok(LogicalStream::Events(crate::events::EventSource::new(Vec::new())))
                }),
            )))
        }
    }

    #[test]
    fn test_find_by_extension() {
        let registry = FormatRegistry::standard();
        let adapter = registry.find(Path::new("/tmp/app.codesize")).unwrap();
        assert_eq!(adapter.format_name(), "Code Size");

        // Case-insensitive
        let adapter = registry.find(Path::new("TRACE.ETL.CSV")).unwrap();
        assert_eq!(adapter.format_name(), "CSV Trace");
    }

    #[test]
    fn test_longest_suffix_wins() {
        let mut registry = FormatRegistry::new();
        registry.register(Box::new(XmlZipAdapter));
        registry.register(Box::new(NativeXmlAdapter));

        let adapter = registry.find(Path::new("run.perfView.xml.zip")).unwrap();
        assert_eq!(adapter.format_name(), "Native XML");

        let adapter = registry.find(Path::new("other.xml.zip")).unwrap();
        assert_eq!(adapter.format_name(), "Any Zipped XML");
    }

    #[test]
    fn test_unknown_format() {
        let registry = FormatRegistry::standard();
        let err = registry.open(Path::new("notes.txt"), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, FormatError::UnknownFormat(_)));
    }

    #[test]
    fn test_standard_registers_every_adapter() {
        assert_eq!(FormatRegistry::standard().adapters().count(), 13);
    }
}
