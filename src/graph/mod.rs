//! Object graph model for heap and size analysis.
//!
//! This module provides:
//! - `MemoryGraph` and its validating `GraphBuilder`
//! - Per-type histograms
//! - Cycle-safe reachability

pub mod histogram;
pub mod memory_graph;
pub mod traversal;

pub use histogram::TypeHistogramEntry;
pub use memory_graph::{GraphBuilder, MemoryGraph, Node, NodeIndex, NodeType, NodeTypeIndex};
pub use traversal::{reachable, reachable_from_root, Reachability};

use crate::formats::{FormatRegistry, StreamKind};
use crate::utils::error::FormatError;
use log::info;
use std::io::Write;
use std::path::Path;

/// Load the graph stream of a heap or size file, selecting the adapter by extension
pub fn load(path: &Path, log: &mut dyn Write) -> Result<MemoryGraph, FormatError> {
    let registry = FormatRegistry::standard();
    let mut data = registry.open(path, log)?.into_data()?;

    let stream = data
        .streams()
        .iter()
        .find(|descriptor| descriptor.kind == StreamKind::Graph)
        .map(|descriptor| descriptor.name.clone())
        .ok_or(FormatError::CapabilityNotSupported {
            format: data.format_name(),
            capability: "graph streams",
        })?;

    let graph = data.open_stream(&stream, log)?.into_graph()?;
    let _ = writeln!(
        log,
        "Loaded {} nodes ({} bytes) from {}",
        graph.node_index_limit(),
        graph.total_size(),
        path.display()
    );
    info!("Loaded graph from {}", path.display());

    // The stream hands out a shared graph; callers get their own copy.
    Ok(std::sync::Arc::try_unwrap(graph).unwrap_or_else(|shared| (*shared).clone()))
}
