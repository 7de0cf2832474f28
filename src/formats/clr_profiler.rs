//! CLR profiler heap dumps (`.clrprofiler`).
//!
//! Text records, one per line:
//!
//! ```text
//! t <typeId> <finalizable> <name>      type declaration
//! o <hexAddr> <typeId> <size> <hexRef>* object and its references
//! r <hexAddr>*                         roots
//! ```
//!
//! Other record kinds are skipped.

use super::adapter::{single_graph_loader, DataFile, FormatAdapter, OpenedFile, StreamDescriptor, StreamKind};
use super::gc_heap::HEAP_STREAM;
use super::input::read_text;
use super::view_state::ViewState;
use crate::graph::{GraphBuilder, MemoryGraph, NodeIndex, NodeTypeIndex};
use crate::utils::error::FormatError;
use log::{debug, warn};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// Type of the synthetic node that references every root
pub const ROOT_NODE_TYPE: &str = "[root]";

struct ObjectRecord<'a> {
    address: u64,
    type_id: u32,
    size: u64,
    references: Vec<&'a str>,
}

fn parse_hex(text: &str) -> Option<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}

pub fn parse(path: &Path, text: &str, log: &mut dyn Write) -> Result<MemoryGraph, FormatError> {
    let mut builder = GraphBuilder::new();
    let mut types: HashMap<u32, NodeTypeIndex> = HashMap::new();
    let mut objects: Vec<ObjectRecord> = Vec::new();
    let mut root_tokens: Vec<&str> = Vec::new();
    let mut skipped = 0usize;

    for (n, line) in text.lines().enumerate() {
        let corrupt = |detail: &str| {
            FormatError::corrupt(path, HEAP_STREAM, format!("line {}: {}", n + 1, detail))
        };
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("t") => {
                let type_id = fields
                    .next()
                    .and_then(|id| id.parse::<u32>().ok())
                    .ok_or_else(|| corrupt("invalid type id"))?;
                // finalizable flag
                fields.next();
                let name = fields.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err(corrupt("type without a name"));
                }
                types.insert(type_id, builder.type_index(&name, None));
            }
            Some("o") => {
                let address = fields
                    .next()
                    .and_then(parse_hex)
                    .ok_or_else(|| corrupt("invalid object address"))?;
                let type_id = fields
                    .next()
                    .and_then(|id| id.parse::<u32>().ok())
                    .ok_or_else(|| corrupt("invalid object type id"))?;
                let size = fields
                    .next()
                    .and_then(super::parse_size)
                    .ok_or_else(|| corrupt("invalid object size"))?;
                objects.push(ObjectRecord {
                    address,
                    type_id,
                    size,
                    references: fields.collect(),
                });
            }
            Some("r") => root_tokens.extend(fields),
            Some(_) => skipped += 1,
            None => {}
        }
    }

    let addresses: HashMap<u64, NodeIndex> = objects
        .iter()
        .enumerate()
        .map(|(i, object)| (object.address, NodeIndex(i as u32)))
        .collect();
    let resolve = |token: &str| parse_hex(token).and_then(|a| addresses.get(&a).copied());

    let mut dropped = 0usize;
    builder.reserve_nodes(objects.len());
    for (i, object) in objects.iter().enumerate() {
        let type_index = *types.get(&object.type_id).ok_or_else(|| {
            FormatError::corrupt(
                path,
                HEAP_STREAM,
                format!("object {:#x} has undeclared type {}", object.address, object.type_id),
            )
        })?;
        let references: Vec<NodeIndex> = object
            .references
            .iter()
            .filter_map(|token| {
                let resolved = resolve(token);
                if resolved.is_none() {
                    dropped += 1;
                }
                resolved
            })
            .collect();
        builder.set_node(NodeIndex(i as u32), type_index, object.size, references);
    }

    let roots: Vec<NodeIndex> = if root_tokens.is_empty() {
        (0..objects.len() as u32).map(NodeIndex).collect()
    } else {
        root_tokens
            .iter()
            .filter_map(|token| {
                let resolved = resolve(token);
                if resolved.is_none() {
                    dropped += 1;
                }
                resolved
            })
            .collect()
    };
    let root_type = builder.type_index(ROOT_NODE_TYPE, None);
    let root = builder.create_node();
    builder.set_node(root, root_type, 0, roots);
    builder.set_root(root);

    if dropped > 0 {
        warn!("Dropped {} references to undeclared objects in {}", dropped, path.display());
    }
    debug!("Skipped {} unrecognized records in {}", skipped, path.display());
    let _ = writeln!(
        log,
        "Read {} objects of {} types from {}, dropped {} dangling references",
        objects.len(),
        types.len(),
        path.display(),
        dropped
    );

    builder
        .build()
        .map_err(|source| FormatError::Graph {
            path: path.to_path_buf(),
            source,
        })
}

pub struct ClrProfilerAdapter;

impl FormatAdapter for ClrProfilerAdapter {
    fn format_name(&self) -> &'static str {
        "CLR Profiler Heap"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &[".clrprofiler"]
    }

    fn open(&self, path: &Path, _log: &mut dyn Write) -> Result<OpenedFile, FormatError> {
        let text = read_text(path, HEAP_STREAM)?;
        let owned = path.to_path_buf();
        Ok(OpenedFile::Data(
            DataFile::new(
                path,
                self.format_name(),
                vec![StreamDescriptor::new(HEAP_STREAM, StreamKind::Graph)],
                single_graph_loader(move |log| parse(&owned, &text, log)),
            )
            .with_view_state(self.default_view_state()),
        ))
    }

    fn default_view_state(&self) -> ViewState {
        ViewState::with_clr_grouping()
    }
}
