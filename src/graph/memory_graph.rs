//! Object graph model for heap and size analysis.
//!
//! Nodes and types are dense indices. Outgoing references are stored in one
//! flat array with per-node offsets, so a loaded graph costs a handful of
//! allocations regardless of node count.

use crate::utils::error::GraphError;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::mem::size_of;

/// Index of a node, always below `node_index_limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a type, always below `type_index_limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeTypeIndex(pub u32);

impl NodeTypeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node type: display name plus optional module
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeType {
    pub name: String,
    pub module: Option<String>,
}

impl NodeType {
    /// `module!name` when a module is known
    pub fn full_name(&self) -> String {
        match &self.module {
            Some(module) if !module.is_empty() => format!("{}!{}", module, self.name),
            _ => self.name.clone(),
        }
    }
}

/// Borrowed view of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node<'a> {
    pub index: NodeIndex,
    pub type_index: NodeTypeIndex,
    pub size: u64,
    pub references: &'a [NodeIndex],
}

/// Directed, possibly cyclic object graph
#[derive(Debug, Clone)]
pub struct MemoryGraph {
    types: Vec<NodeType>,
    node_types: Vec<NodeTypeIndex>,
    node_sizes: Vec<u64>,
    // references of node i are refs[ref_offsets[i]..ref_offsets[i + 1]]
    ref_offsets: Vec<usize>,
    refs: Vec<NodeIndex>,
    root: Option<NodeIndex>,
    total_size: u64,
}

impl MemoryGraph {
    pub fn node_index_limit(&self) -> usize {
        self.node_types.len()
    }

    pub fn type_index_limit(&self) -> usize {
        self.types.len()
    }

    /// Sum of all recorded node sizes
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Sum of outgoing reference counts over all nodes
    pub fn total_reference_count(&self) -> usize {
        self.refs.len()
    }

    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    pub fn node(&self, index: NodeIndex) -> Option<Node<'_>> {
        let i = index.index();
        if i >= self.node_index_limit() {
            return None;
        }
        Some(Node {
            index,
            type_index: self.node_types[i],
            size: self.node_sizes[i],
            references: &self.refs[self.ref_offsets[i]..self.ref_offsets[i + 1]],
        })
    }

    pub fn node_type(&self, index: NodeTypeIndex) -> Option<&NodeType> {
        self.types.get(index.index())
    }

    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        (0..self.node_index_limit()).filter_map(move |i| self.node(NodeIndex(i as u32)))
    }

    pub fn types(&self) -> impl Iterator<Item = (NodeTypeIndex, &NodeType)> + '_ {
        self.types
            .iter()
            .enumerate()
            .map(|(i, node_type)| (NodeTypeIndex(i as u32), node_type))
    }

    pub(crate) fn node_type_index(&self, index: usize) -> NodeTypeIndex {
        self.node_types[index]
    }

    pub(crate) fn node_size(&self, index: usize) -> u64 {
        self.node_sizes[index]
    }

    pub(crate) fn references_of(&self, index: usize) -> &[NodeIndex] {
        &self.refs[self.ref_offsets[index]..self.ref_offsets[index + 1]]
    }

    /// Bytes used by this in-memory representation (not the heap it describes)
    pub fn describe_graph_size_in_bytes(&self) -> usize {
        let type_names: usize = self
            .types
            .iter()
            .map(|t| t.name.capacity() + t.module.as_ref().map_or(0, String::capacity))
            .sum();

        size_of::<Self>()
            + self.types.capacity() * size_of::<NodeType>()
            + type_names
            + self.node_types.capacity() * size_of::<NodeTypeIndex>()
            + self.node_sizes.capacity() * size_of::<u64>()
            + self.ref_offsets.capacity() * size_of::<usize>()
            + self.refs.capacity() * size_of::<NodeIndex>()
    }
}

/// Incremental graph constructor used by every graph loader.
///
/// Nodes may be defined in any order and refer forward to nodes not yet
/// defined; `build` validates every index once at the end.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    types: IndexMap<NodeType, ()>,
    nodes: Vec<Option<PendingNode>>,
    root: Option<NodeIndex>,
}

#[derive(Debug)]
struct PendingNode {
    type_index: NodeTypeIndex,
    size: u64,
    references: Vec<NodeIndex>,
}

/// Type used for nodes that were allocated but never defined
pub const UNDEFINED_NODE_TYPE: &str = "UNDEFINED";

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a type by (name, module)
    pub fn type_index(&mut self, name: &str, module: Option<&str>) -> NodeTypeIndex {
        let node_type = NodeType {
            name: name.to_string(),
            module: module.filter(|m| !m.is_empty()).map(str::to_string),
        };
        let (index, _) = self.types.insert_full(node_type, ());
        NodeTypeIndex(index as u32)
    }

    /// Append a fresh, not yet defined node
    pub fn create_node(&mut self) -> NodeIndex {
        self.nodes.push(None);
        NodeIndex((self.nodes.len() - 1) as u32)
    }

    /// Make sure indices up to `count` exist
    pub fn reserve_nodes(&mut self, count: usize) {
        if self.nodes.len() < count {
            self.nodes.resize_with(count, || None);
        }
    }

    /// Define (or redefine) a node
    pub fn set_node(
        &mut self,
        index: NodeIndex,
        type_index: NodeTypeIndex,
        size: u64,
        references: Vec<NodeIndex>,
    ) {
        self.reserve_nodes(index.index() + 1);
        self.nodes[index.index()] = Some(PendingNode {
            type_index,
            size,
            references,
        });
    }

    pub fn set_root(&mut self, root: NodeIndex) {
        self.root = Some(root);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Validate indices and freeze the graph
    ///
    /// # Errors
    /// * `GraphError::MalformedGraphFile` - a type, reference or root index is out of range
    pub fn build(mut self) -> Result<MemoryGraph, GraphError> {
        let node_limit = self.nodes.len();

        let undefined = if self.nodes.iter().any(Option::is_none) {
            Some(self.type_index(UNDEFINED_NODE_TYPE, None))
        } else {
            None
        };
        let type_limit = self.types.len();

        if let Some(root) = self.root {
            if root.index() >= node_limit {
                return Err(GraphError::MalformedGraphFile(format!(
                    "root index {} out of range (node count {})",
                    root.0, node_limit
                )));
            }
        }

        let mut node_types = Vec::with_capacity(node_limit);
        let mut node_sizes = Vec::with_capacity(node_limit);
        let mut ref_offsets = Vec::with_capacity(node_limit + 1);
        let mut refs = Vec::new();
        let mut total_size: u64 = 0;
        ref_offsets.push(0);

        for (i, node) in self.nodes.into_iter().enumerate() {
            match node {
                Some(node) => {
                    if node.type_index.index() >= type_limit {
                        return Err(GraphError::MalformedGraphFile(format!(
                            "node {} has type index {} (type count {})",
                            i, node.type_index.0, type_limit
                        )));
                    }
                    if let Some(bad) = node.references.iter().find(|r| r.index() >= node_limit) {
                        return Err(GraphError::MalformedGraphFile(format!(
                            "node {} references {} (node count {})",
                            i, bad.0, node_limit
                        )));
                    }
                    node_types.push(node.type_index);
                    node_sizes.push(node.size);
                    total_size = total_size.saturating_add(node.size);
                    refs.extend(node.references);
                }
                None => {
                    // `undefined` is always set when any node is missing
                    node_types.push(undefined.unwrap_or(NodeTypeIndex(0)));
                    node_sizes.push(0);
                }
            }
            ref_offsets.push(refs.len());
        }

        let types: Vec<NodeType> = self.types.into_keys().collect();
        debug!(
            "Built graph: {} nodes, {} types, {} references, {} bytes",
            node_types.len(),
            types.len(),
            refs.len(),
            total_size
        );

        Ok(MemoryGraph {
            types,
            node_types,
            node_sizes,
            ref_offsets,
            refs,
            root: self.root,
            total_size,
        })
    }
}
