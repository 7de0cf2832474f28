//! The native save model shared by `.perfView.json` and `.perfView.xml`.
//!
//! Frame and stack ids are the source's interned ids, so serializing the
//! same source twice gives identical output.

use super::adapter::{DataFile, LogicalStream, StreamDescriptor, StreamKind};
use super::view_state::ViewState;
use crate::model::{CallPathId, FrameId, StackSource, StackSourceBuilder};
use crate::utils::config::NATIVE_FORMAT_VERSION;
use crate::utils::error::FormatError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// The single stream of a native document
pub const STACKS_STREAM: &str = "Stacks";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NativeDocument {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, rename = "StackWindowGuiState")]
    pub view_state: ViewState,
    pub stack_source: NativeStackSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NativeStackSource {
    pub name: String,
    pub units: String,
    pub frames: Vec<NativeFrame>,
    pub stacks: Vec<NativeStack>,
    pub samples: Vec<NativeSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NativeFrame {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(default)]
    pub module: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NativeStack {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "CallerID", default, skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<u32>,
    #[serde(rename = "FrameID")]
    pub frame_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NativeSample {
    pub time: f64,
    pub metric: f64,
    #[serde(rename = "StackID")]
    pub stack_id: u32,
    #[serde(rename = "ProcessID", default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
}

impl NativeDocument {
    /// Snapshot a source and its view state, without a generation stamp
    pub fn new(source: &StackSource, view_state: &ViewState) -> Self {
        Self {
            version: NATIVE_FORMAT_VERSION,
            generated_at: None,
            view_state: view_state.clone(),
            stack_source: NativeStackSource::from_source(source),
        }
    }

    /// Wrap a parsed document as a data file with one `Stacks` stream.
    ///
    /// Saved data no longer carries addresses, so symbol lookup is refused.
    pub(crate) fn into_data_file(
        self,
        path: &Path,
        format_name: &'static str,
        log: &mut dyn Write,
    ) -> Result<DataFile, FormatError> {
        if self.version > NATIVE_FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion {
                path: path.to_path_buf(),
                format: format_name,
                version: self.version,
            });
        }
        let _ = writeln!(
            log,
            "Read {} saved samples from {}",
            self.stack_source.samples.len(),
            path.display()
        );

        let native = self.stack_source;
        let owned_path = path.to_path_buf();
        let loader = Box::new(move |_: &str, _: &mut dyn Write| {
            native
                .clone()
                .into_source()
                .map(|source| LogicalStream::Stack(Arc::new(source)))
                .map_err(|detail| FormatError::corrupt(&owned_path, STACKS_STREAM, detail))
        });

        Ok(DataFile::new(
            path,
            format_name,
            vec![StreamDescriptor::new(STACKS_STREAM, StreamKind::Stack)],
            loader,
        )
        .with_view_state(self.view_state)
        .without_symbol_lookup())
    }
}

impl NativeStackSource {
    pub fn from_source(source: &StackSource) -> Self {
        let frames = source
            .frames()
            .iter()
            .map(|(id, frame)| NativeFrame {
                id: id.0,
                module: frame.module.clone(),
                name: frame.name.clone(),
            })
            .collect();

        let stacks = source
            .call_paths()
            .iter()
            .map(|(id, node)| NativeStack {
                id: id.0,
                caller_id: node.caller.map(|caller| caller.0),
                frame_id: node.frame.0,
            })
            .collect();

        let samples = source
            .samples()
            .iter()
            .map(|sample| NativeSample {
                time: sample.time_relative_msec,
                metric: sample.metric,
                stack_id: sample.call_path.0,
                process_id: sample.process_id,
            })
            .collect();

        Self {
            name: source.name().to_string(),
            units: source.metric_unit().to_string(),
            frames,
            stacks,
            samples,
        }
    }

    /// Rebuild a source, validating every id reference
    pub fn into_source(self) -> Result<StackSource, String> {
        let mut builder = StackSourceBuilder::new(self.name, self.units);

        let mut frames: HashMap<u32, FrameId> = HashMap::with_capacity(self.frames.len());
        for frame in &self.frames {
            let id = builder.intern_frame(&frame.module, &frame.name);
            if frames.insert(frame.id, id).is_some() {
                return Err(format!("duplicate frame ID {}", frame.id));
            }
        }

        // Stacks must be listed callers first.
        let mut stacks: HashMap<u32, CallPathId> = HashMap::with_capacity(self.stacks.len());
        for stack in &self.stacks {
            let frame = *frames
                .get(&stack.frame_id)
                .ok_or_else(|| format!("stack {} references unknown frame {}", stack.id, stack.frame_id))?;
            let caller = match stack.caller_id {
                Some(caller_id) => Some(*stacks.get(&caller_id).ok_or_else(|| {
                    format!("stack {} references unknown caller {}", stack.id, caller_id)
                })?),
                None => None,
            };
            let path = builder.call_path(frame, caller);
            if stacks.insert(stack.id, path).is_some() {
                return Err(format!("duplicate stack ID {}", stack.id));
            }
        }

        for sample in &self.samples {
            let path = *stacks
                .get(&sample.stack_id)
                .ok_or_else(|| format!("sample references unknown stack {}", sample.stack_id))?;
            builder.add_sample(Some(path), sample.metric, sample.time, sample.process_id);
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source() -> StackSource {
        let mut builder = StackSourceBuilder::new("cpu", "msec");
        builder.add_stack(["app!main", "app!foo"], 10.0, 1.5, Some(7));
        builder.add_stack(["app!main"], 2.0, 3.0, None);
        builder.build()
    }

    #[test]
    fn test_rebuild_preserves_totals() {
        let source = sample_source();
        let rebuilt = NativeStackSource::from_source(&source).into_source().unwrap();
        assert_eq!(rebuilt.totals_by_path(), source.totals_by_path());
        assert_eq!(rebuilt.samples(), source.samples());
    }

    #[test]
    fn test_dangling_stack_reference() {
        let mut native = NativeStackSource::from_source(&sample_source());
        native.samples[0].stack_id = 99;
        assert!(native.into_source().unwrap_err().contains("unknown stack 99"));
    }

    #[test]
    fn test_caller_must_precede_callee() {
        let mut native = NativeStackSource::from_source(&sample_source());
        native.stacks.reverse();
        assert!(native.into_source().is_err());
    }
}
