//! Binary heap graph dumps (`.gcheap`).
//!
//! Little-endian layout:
//!
//! ```text
//! magic    b"!GCHEAP!"
//! version  u32                       1 or 2
//! types    u32 count, then per type: string name [, string module (v2)]
//! nodes    u32 count, then per node: u32 type, u64 size, u32 ref count, u32 refs...
//! root     u32                       u32::MAX when absent
//! ```
//!
//! Strings are a `u32` byte length followed by UTF-8.

use super::adapter::{single_graph_loader, DataFile, FormatAdapter, OpenedFile, StreamDescriptor, StreamKind};
use super::input::read_bytes;
use super::view_state::ViewState;
use crate::graph::{GraphBuilder, MemoryGraph, NodeIndex, NodeTypeIndex};
use crate::utils::config::{GCHEAP_MAGIC, GCHEAP_MAX_VERSION, GCHEAP_NO_ROOT};
use crate::utils::error::{FormatError, GraphError};
use log::debug;
use std::io::{self, Write};
use std::path::Path;

pub const HEAP_STREAM: &str = "Heap";

const MIN_NODE_RECORD_BYTES: usize = 16;

/// Bounds-checked little-endian cursor
struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], GraphError> {
        let available = self.data.len() - self.offset;
        if len > available {
            return Err(GraphError::TruncatedFile {
                offset: self.offset,
                needed: len - available,
            });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn u32(&mut self) -> Result<u32, GraphError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> Result<u64, GraphError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn string(&mut self) -> Result<String, GraphError> {
        let len = self.u32()? as usize;
        let offset = self.offset;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            GraphError::MalformedGraphFile(format!("invalid UTF-8 string at offset {}", offset))
        })
    }
}

/// Decode a `.gcheap` image
pub fn read_graph(data: &[u8]) -> Result<MemoryGraph, GraphError> {
    let mut reader = ByteReader::new(data);

    let magic = reader.take(GCHEAP_MAGIC.len())?;
    if magic != GCHEAP_MAGIC {
        return Err(GraphError::MalformedGraphFile("bad magic".to_string()));
    }
    let version = reader.u32()?;
    if version == 0 || version > GCHEAP_MAX_VERSION {
        return Err(GraphError::UnsupportedVersion(version));
    }

    let mut builder = GraphBuilder::new();
    let type_count = reader.u32()?;
    let mut types = Vec::with_capacity(type_count.min(1 << 16) as usize);
    for _ in 0..type_count {
        let name = reader.string()?;
        let module = if version >= 2 { reader.string()? } else { String::new() };
        types.push(builder.type_index(&name, Some(module.as_str())));
    }
    // Duplicate (name, module) pairs collapse in the builder; keep the file's numbering.
    let type_for = |raw: u32| -> Result<NodeTypeIndex, GraphError> {
        types.get(raw as usize).copied().ok_or_else(|| {
            GraphError::MalformedGraphFile(format!("type index {} out of range ({})", raw, type_count))
        })
    };

    let node_count = reader.u32()?;
    // Smallest node record: type, size and an empty reference list.
    let minimum = (node_count as usize).saturating_mul(MIN_NODE_RECORD_BYTES);
    if minimum > reader.remaining() {
        return Err(GraphError::TruncatedFile {
            offset: reader.offset,
            needed: minimum - reader.remaining(),
        });
    }
    builder.reserve_nodes(node_count as usize);
    for index in 0..node_count {
        let type_index = type_for(reader.u32()?)?;
        let size = reader.u64()?;
        let ref_count = reader.u32()?;
        let references = (0..ref_count)
            .map(|_| reader.u32().map(NodeIndex))
            .collect::<Result<Vec<_>, _>>()?;
        builder.set_node(NodeIndex(index), type_index, size, references);
    }

    let root = reader.u32()?;
    if root != GCHEAP_NO_ROOT {
        builder.set_root(NodeIndex(root));
    }

    debug!("Decoded gcheap v{}: {} types, {} nodes", version, type_count, node_count);
    builder.build()
}

/// Serializes a graph in the current `.gcheap` revision
pub struct GcHeapWriter<W: Write> {
    out: W,
}

impl<W: Write> GcHeapWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn u32(&mut self, value: u32) -> io::Result<()> {
        self.out.write_all(&value.to_le_bytes())
    }

    fn string(&mut self, value: &str) -> io::Result<()> {
        self.u32(value.len() as u32)?;
        self.out.write_all(value.as_bytes())
    }

    pub fn write_graph(mut self, graph: &MemoryGraph) -> io::Result<W> {
        self.out.write_all(GCHEAP_MAGIC)?;
        self.u32(GCHEAP_MAX_VERSION)?;

        self.u32(graph.type_index_limit() as u32)?;
        for (_, node_type) in graph.types() {
            self.string(&node_type.name)?;
            self.string(node_type.module.as_deref().unwrap_or_default())?;
        }

        self.u32(graph.node_index_limit() as u32)?;
        for node in graph.nodes() {
            self.u32(node.type_index.0)?;
            self.out.write_all(&node.size.to_le_bytes())?;
            self.u32(node.references.len() as u32)?;
            for reference in node.references {
                self.u32(reference.0)?;
            }
        }

        self.u32(graph.root().map_or(GCHEAP_NO_ROOT, |root| root.0))?;
        self.out.flush()?;
        Ok(self.out)
    }
}

pub struct GcHeapAdapter;

impl FormatAdapter for GcHeapAdapter {
    fn format_name(&self) -> &'static str {
        "GC Heap"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".gcheap"]
    }

    fn open(&self, path: &Path, _log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let bytes = read_bytes(path)?;
        // A newer revision is rejected up front rather than per stream.
        if bytes.starts_with(GCHEAP_MAGIC) && bytes.len() >= GCHEAP_MAGIC.len() + 4 {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[GCHEAP_MAGIC.len()..GCHEAP_MAGIC.len() + 4]);
            let version = u32::from_le_bytes(raw);
            if version > GCHEAP_MAX_VERSION {
                return Err(FormatError::UnsupportedVersion {
                    path: path.to_path_buf(),
                    format: self.format_name(),
                    version,
                });
            }
        }

        let owned = path.to_path_buf();
        let loader = single_graph_loader(move |log| {
            let graph = read_graph(&bytes).map_err(|source| FormatError::Graph {
                path: owned.clone(),
                source,
            })?;
            let _ = writeln!(
                log,
                "Read {} objects, {} bytes from {}",
                graph.node_index_limit(),
                graph.total_size(),
                owned.display()
            );
            Ok(graph)
        });

        Ok(OpenedFile::Data(
            DataFile::new(
                path,
                self.format_name(),
                vec![StreamDescriptor::new(HEAP_STREAM, StreamKind::Graph)],
                loader,
            )
            .with_view_state(self.default_view_state()),
        ))
    }

    fn default_view_state(&self) -> ViewState {
        ViewState::with_clr_grouping()
    }
}
