//! Native JSON save format (`.perfView.json`, optionally zipped).

use super::adapter::{FormatAdapter, OpenedFile};
use super::input::read_maybe_zipped_text;
use super::native::NativeDocument;
use super::view_state::ViewState;
use crate::model::StackSource;
use crate::utils::error::FormatError;
use std::io::Write;
use std::path::Path;

pub use super::native::STACKS_STREAM;

/// Serialize a source and its view state; no timestamp, so output is reproducible
pub fn to_json_string(source: &StackSource, view_state: &ViewState) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&NativeDocument::new(source, view_state))
}

pub fn parse_document(path: &Path, text: &str) -> Result<NativeDocument, FormatError> {
    serde_json::from_str(text).map_err(|e| FormatError::corrupt(path, STACKS_STREAM, e.to_string()))
}

pub struct NativeJsonAdapter;

impl FormatAdapter for NativeJsonAdapter {
    fn format_name(&self) -> &'static str {
        "Native JSON"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".perfView.json", ".perfView.json.zip"]
    }

    fn open(&self, path: &Path, log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let text = read_maybe_zipped_text(path, ".perfView.json", STACKS_STREAM)?;
        let document = parse_document(path, &text)?;
        Ok(OpenedFile::Data(document.into_data_file(
            path,
            self.format_name(),
            log,
        )?))
    }
}
