//! The format adapter contract.
//!
//! An adapter turns a path into an `OpenedFile`: either a `DataFile` that
//! declares one or more named logical streams, or a `CaptureTrigger` for
//! inputs that can only be handed to an external tool. Streams are parsed
//! when first opened, so a structural error in one stream leaves the others
//! usable.

use super::view_state::ViewState;
use crate::events::{EventSource, HandleState};
use crate::graph::MemoryGraph;
use crate::model::StackSource;
use crate::symbols::{ResolvedSymbols, SymbolResolver};
use crate::utils::error::{FormatError, SymbolError};
use log::debug;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use super::process_dump::CaptureTrigger;

/// What a logical stream materializes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stack,
    Graph,
    Events,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StreamKind::Stack => "stack",
            StreamKind::Graph => "graph",
            StreamKind::Events => "events",
        };
        f.write_str(label)
    }
}

/// A stream declared by a data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub name: String,
    pub kind: StreamKind,
}

impl StreamDescriptor {
    pub fn new(name: impl Into<String>, kind: StreamKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A materialized stream
#[derive(Debug, Clone)]
pub enum LogicalStream {
    Stack(Arc<StackSource>),
    Graph(Arc<MemoryGraph>),
    Events(EventSource),
}

impl LogicalStream {
    pub fn kind(&self) -> StreamKind {
        match self {
            LogicalStream::Stack(_) => StreamKind::Stack,
            LogicalStream::Graph(_) => StreamKind::Graph,
            LogicalStream::Events(_) => StreamKind::Events,
        }
    }

    fn mismatch(&self, capability: &'static str) -> FormatError {
        let format = match self.kind() {
            StreamKind::Stack => "stack stream",
            StreamKind::Graph => "graph stream",
            StreamKind::Events => "event stream",
        };
        FormatError::CapabilityNotSupported { format, capability }
    }

    pub fn into_stack(self) -> Result<Arc<StackSource>, FormatError> {
        match self {
            LogicalStream::Stack(source) => Ok(source),
            other => Err(other.mismatch("stack samples")),
        }
    }

    pub fn into_graph(self) -> Result<Arc<MemoryGraph>, FormatError> {
        match self {
            LogicalStream::Graph(graph) => Ok(graph),
            other => Err(other.mismatch("object graphs")),
        }
    }

    pub fn into_events(self) -> Result<EventSource, FormatError> {
        match self {
            LogicalStream::Events(events) => Ok(events),
            other => Err(other.mismatch("event records")),
        }
    }
}

/// Parses one named stream out of input the adapter already read
pub type StreamLoader =
    Box<dyn Fn(&str, &mut dyn Write) -> Result<LogicalStream, FormatError> + Send + Sync>;

#[derive(Debug)]
struct StreamSlot {
    descriptor: StreamDescriptor,
    state: HandleState,
    cached: Option<LogicalStream>,
}

/// An opened file exposing one or more logical streams
pub struct DataFile {
    path: PathBuf,
    format_name: &'static str,
    slots: Vec<StreamSlot>,
    loader: StreamLoader,
    view_state: ViewState,
    symbol_lookup: bool,
}

impl fmt::Debug for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFile")
            .field("path", &self.path)
            .field("format_name", &self.format_name)
            .field("slots", &self.slots)
            .field("view_state", &self.view_state)
            .field("symbol_lookup", &self.symbol_lookup)
            .finish_non_exhaustive()
    }
}

impl DataFile {
    pub fn new(
        path: &Path,
        format_name: &'static str,
        streams: Vec<StreamDescriptor>,
        loader: StreamLoader,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            format_name,
            slots: streams
                .into_iter()
                .map(|descriptor| StreamSlot {
                    descriptor,
                    state: HandleState::Unopened,
                    cached: None,
                })
                .collect(),
            loader,
            view_state: ViewState::default(),
            symbol_lookup: true,
        }
    }

    pub fn with_view_state(mut self, view_state: ViewState) -> Self {
        self.view_state = view_state;
        self
    }

    /// Mark the data as re-serialized: symbol lookup is refused
    pub fn without_symbol_lookup(mut self) -> Self {
        self.symbol_lookup = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format_name(&self) -> &'static str {
        self.format_name
    }

    pub fn streams(&self) -> Vec<StreamDescriptor> {
        self.slots.iter().map(|slot| slot.descriptor.clone()).collect()
    }

    pub fn stream_names(&self) -> Vec<&str> {
        self.slots
            .iter()
            .map(|slot| slot.descriptor.name.as_str())
            .collect()
    }

    /// Reader state of a declared stream
    pub fn stream_state(&self, name: &str) -> Option<HandleState> {
        self.slots
            .iter()
            .find(|slot| slot.descriptor.name == name)
            .map(|slot| slot.state)
    }

    pub fn default_view_state(&self) -> &ViewState {
        &self.view_state
    }

    pub fn supports_symbol_lookup(&self) -> bool {
        self.symbol_lookup
    }

    /// Materialize a declared stream.
    ///
    /// The first successful open parses the stream; later opens share the
    /// parsed model. Failed parses are not cached.
    ///
    /// # Errors
    /// * `FormatError::UnsupportedStream` - `name` is not declared by this file
    /// * `FormatError::CorruptData` - the stream's data is structurally invalid
    pub fn open_stream(
        &mut self,
        name: &str,
        log: &mut dyn Write,
    ) -> Result<LogicalStream, FormatError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.descriptor.name == name)
            .ok_or_else(|| FormatError::UnsupportedStream {
                path: self.path.clone(),
                stream: name.to_string(),
            })?;

        if let Some(cached) = &slot.cached {
            slot.state = HandleState::Cloned;
            debug!("Reusing parsed stream '{}' of {}", name, self.path.display());
            return Ok(cached.clone());
        }

        let stream = (self.loader)(name, log)?;
        if stream.kind() != slot.descriptor.kind {
            return Err(FormatError::corrupt(
                &self.path,
                name,
                format!(
                    "declared as {} stream but produced {}",
                    slot.descriptor.kind,
                    stream.kind()
                ),
            ));
        }

        slot.state = HandleState::Live;
        slot.cached = Some(stream.clone());
        Ok(stream)
    }

    /// Ask `resolver` for a module's symbols, if this data still allows it
    pub fn lookup_symbols(
        &self,
        resolver: &dyn SymbolResolver,
        module: &str,
        process_id: Option<u32>,
        log: &mut dyn Write,
    ) -> Result<ResolvedSymbols, FormatError> {
        if !self.symbol_lookup {
            return Err(SymbolError::SymbolResolutionNotSupported {
                format: self.format_name,
            }
            .into());
        }
        Ok(resolver.resolve(module, process_id, log)?)
    }
}

/// Result of opening a path
#[derive(Debug)]
pub enum OpenedFile {
    Data(DataFile),
    Trigger(CaptureTrigger),
}

impl OpenedFile {
    pub fn format_name(&self) -> &'static str {
        match self {
            OpenedFile::Data(data) => data.format_name(),
            OpenedFile::Trigger(trigger) => trigger.format_name(),
        }
    }

    /// The data file, or `CapabilityNotSupported` for trigger-only inputs
    pub fn into_data(self) -> Result<DataFile, FormatError> {
        match self {
            OpenedFile::Data(data) => Ok(data),
            OpenedFile::Trigger(trigger) => Err(FormatError::CapabilityNotSupported {
                format: trigger.format_name(),
                capability: "data streams",
            }),
        }
    }

    pub fn into_trigger(self) -> Result<CaptureTrigger, FormatError> {
        match self {
            OpenedFile::Trigger(trigger) => Ok(trigger),
            OpenedFile::Data(data) => Err(FormatError::CapabilityNotSupported {
                format: data.format_name(),
                capability: "capture triggers",
            }),
        }
    }
}

/// A file format that can be opened from a path
pub trait FormatAdapter: Send + Sync {
    /// Human-readable format name
    fn format_name(&self) -> &'static str;

    /// Suffixes (including the leading dot) this adapter claims
    fn file_extensions(&self) -> &'static [&'static str];

    /// Read `path` and declare its streams
    fn open(&self, path: &Path, log: &mut dyn Write) -> Result<OpenedFile, FormatError>;

    /// View state suggested for data of this format
    fn default_view_state(&self) -> ViewState {
        ViewState::default()
    }
}

/// Loader for a file with a single stack stream
pub(crate) fn single_stack_loader<F>(parse: F) -> StreamLoader
where
    F: Fn(&mut dyn Write) -> Result<StackSource, FormatError> + Send + Sync + 'static,
{
    Box::new(move |_, log| parse(log).map(|source| LogicalStream::Stack(Arc::new(source))))
}

/// Loader for a file with a single graph stream
pub(crate) fn single_graph_loader<F>(parse: F) -> StreamLoader
where
    F: Fn(&mut dyn Write) -> Result<MemoryGraph, FormatError> + Send + Sync + 'static,
{
    Box::new(move |_, log| parse(log).map(|graph| LogicalStream::Graph(Arc::new(graph))))
}
