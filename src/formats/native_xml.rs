//! Native XML save format (`.perfView.xml`, optionally zipped).
//!
//! ```text
//! <StackWindow Version GeneratedAt>
//!   <StackWindowGuiState>...</StackWindowGuiState>
//!   <StackSource Name Units>
//!     <Frames><Frame ID Module>name</Frame></Frames>
//!     <Stacks><Stack ID [CallerID] FrameID/></Stacks>
//!     <Samples><Sample Time Metric StackID [ProcessID]/></Samples>
//!   </StackSource>
//! </StackWindow>
//! ```

use super::adapter::{FormatAdapter, OpenedFile};
use super::input::read_maybe_zipped_text;
use super::native::{NativeDocument, NativeFrame, NativeSample, NativeStack, NativeStackSource};
use super::view_state::{ViewState, VIEW_STATE_ELEMENT};
use super::xml_tree::{self, XmlElement};
use crate::utils::config::NATIVE_FORMAT_VERSION;
use crate::utils::error::FormatError;
use std::io::Write;
use std::path::Path;

pub use super::native::STACKS_STREAM;

pub fn to_xml_string(document: &NativeDocument) -> String {
    let source = &document.stack_source;

    let frames = source.frames.iter().fold(XmlElement::new("Frames"), |list, frame| {
        list.with_child(
            XmlElement::new("Frame")
                .with_attr("ID", frame.id)
                .with_attr("Module", &frame.module)
                .with_text(frame.name.clone()),
        )
    });

    let stacks = source.stacks.iter().fold(XmlElement::new("Stacks"), |list, stack| {
        let mut element = XmlElement::new("Stack").with_attr("ID", stack.id);
        if let Some(caller) = stack.caller_id {
            element = element.with_attr("CallerID", caller);
        }
        list.with_child(element.with_attr("FrameID", stack.frame_id))
    });

    let samples = source.samples.iter().fold(XmlElement::new("Samples"), |list, sample| {
        let mut element = XmlElement::new("Sample")
            .with_attr("Time", sample.time)
            .with_attr("Metric", sample.metric)
            .with_attr("StackID", sample.stack_id);
        if let Some(pid) = sample.process_id {
            element = element.with_attr("ProcessID", pid);
        }
        list.with_child(element)
    });

    let mut root = XmlElement::new("StackWindow").with_attr("Version", document.version);
    if let Some(generated_at) = &document.generated_at {
        root = root.with_attr("GeneratedAt", generated_at);
    }
    root.with_child(document.view_state.to_xml_element())
        .with_child(
            XmlElement::new("StackSource")
                .with_attr("Name", &source.name)
                .with_attr("Units", &source.units)
                .with_child(frames)
                .with_child(stacks)
                .with_child(samples),
        )
        .to_xml_string()
}

pub fn parse_document(text: &str) -> Result<NativeDocument, String> {
    let root = xml_tree::parse_document(text)?;
    if root.name != "StackWindow" {
        return Err(format!("expected <StackWindow>, found <{}>", root.name));
    }

    let view_state = match root.child(VIEW_STATE_ELEMENT) {
        Some(element) => ViewState::from_xml_element(element)?,
        None => ViewState::default(),
    };

    let source = root
        .child("StackSource")
        .ok_or_else(|| "missing <StackSource>".to_string())?;
    let list = |name: &str| source.child(name).map(|e| e.children.as_slice()).unwrap_or_default();

    let frames = list("Frames")
        .iter()
        .filter(|e| e.name == "Frame")
        .map(|e| -> Result<NativeFrame, String> {
            Ok(NativeFrame {
                id: e.require_attr("ID")?,
                module: e.attr("Module").unwrap_or_default().to_string(),
                name: e.text.clone(),
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    let stacks = list("Stacks")
        .iter()
        .filter(|e| e.name == "Stack")
        .map(|e| -> Result<NativeStack, String> {
            Ok(NativeStack {
                id: e.require_attr("ID")?,
                caller_id: e.parse_attr("CallerID")?,
                frame_id: e.require_attr("FrameID")?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    let samples = list("Samples")
        .iter()
        .filter(|e| e.name == "Sample")
        .map(|e| -> Result<NativeSample, String> {
            Ok(NativeSample {
                time: e.parse_attr("Time")?.unwrap_or(0.0),
                metric: e.parse_attr("Metric")?.unwrap_or(1.0),
                stack_id: e.require_attr("StackID")?,
                process_id: e.parse_attr("ProcessID")?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(NativeDocument {
        version: root.parse_attr("Version")?.unwrap_or(NATIVE_FORMAT_VERSION),
        generated_at: root.attr("GeneratedAt").map(str::to_string),
        view_state,
        stack_source: NativeStackSource {
            name: source.attr("Name").unwrap_or(STACKS_STREAM).to_string(),
            units: source.attr("Units").unwrap_or("msec").to_string(),
            frames,
            stacks,
            samples,
        },
    })
}

pub struct NativeXmlAdapter;

impl FormatAdapter for NativeXmlAdapter {
    fn format_name(&self) -> &'static str {
        "Native XML"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".perfView.xml", ".perfView.xml.zip"]
    }

    fn open(&self, path: &Path, log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let text = read_maybe_zipped_text(path, ".perfView.xml", STACKS_STREAM)?;
        let document =
            parse_document(&text).map_err(|detail| FormatError::corrupt(path, STACKS_STREAM, detail))?;
        Ok(OpenedFile::Data(document.into_data_file(
            path,
            self.format_name(),
            log,
        )?))
    }
}
