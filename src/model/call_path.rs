//! Call path interning.
//!
//! A call path is stored as a chain of `(frame, caller)` nodes running
//! from leaf to root. Interning the node pairs means every distinct
//! leaf-to-root sequence maps to exactly one node, so samples with the
//! same stack share storage and compare by id.

use super::interner::FrameId;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Index of a call path node within one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallPathId(pub u32);

impl CallPathId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One link of a call path: the frame at this level plus the path of its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallPathNode {
    pub frame: FrameId,
    pub caller: Option<CallPathId>,
}

/// Interned call path nodes.
///
/// Invariant: a node's caller always has a smaller id than the node itself,
/// because the caller must already exist when the node is interned.
#[derive(Debug, Clone, Default)]
pub struct CallPathTable {
    nodes: IndexSet<CallPathNode>,
}

impl CallPathTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the node for `frame` called from `caller`, creating it if needed
    pub fn intern(&mut self, frame: FrameId, caller: Option<CallPathId>) -> CallPathId {
        let (index, _) = self.nodes.insert_full(CallPathNode { frame, caller });
        CallPathId(index as u32)
    }

    /// Intern a whole path given root first; returns the leaf node, or `None` for an empty path
    pub fn intern_root_first<I>(&mut self, frames: I) -> Option<CallPathId>
    where
        I: IntoIterator<Item = FrameId>,
    {
        frames
            .into_iter()
            .fold(None, |caller, frame| Some(self.intern(frame, caller)))
    }

    /// Look up a node without interning
    pub fn find(&self, frame: FrameId, caller: Option<CallPathId>) -> Option<CallPathId> {
        self.nodes
            .get_index_of(&CallPathNode { frame, caller })
            .map(|index| CallPathId(index as u32))
    }

    pub fn node(&self, id: CallPathId) -> Option<&CallPathNode> {
        self.nodes.get_index(id.index())
    }

    pub fn frame(&self, id: CallPathId) -> Option<FrameId> {
        self.node(id).map(|node| node.frame)
    }

    pub fn caller(&self, id: CallPathId) -> Option<CallPathId> {
        self.node(id).and_then(|node| node.caller)
    }

    /// Frames from leaf to root
    pub fn frames_leaf_to_root(&self, id: CallPathId) -> Vec<FrameId> {
        let mut frames = Vec::new();
        let mut current = Some(id);
        while let Some(path) = current {
            match self.node(path) {
                Some(node) => {
                    frames.push(node.frame);
                    current = node.caller;
                }
                None => break,
            }
        }
        frames
    }

    /// Frames from root to leaf
    pub fn frames_root_first(&self, id: CallPathId) -> Vec<FrameId> {
        let mut frames = self.frames_leaf_to_root(id);
        frames.reverse();
        frames
    }

    /// Number of frames on the path
    pub fn depth(&self, id: CallPathId) -> usize {
        let mut depth = 0;
        let mut current = Some(id);
        while let Some(node) = current.and_then(|path| self.node(path)) {
            depth += 1;
            current = node.caller;
        }
        depth
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in id order
    pub fn iter(&self) -> impl Iterator<Item = (CallPathId, &CallPathNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (CallPathId(index as u32), node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_sequences_share_node() {
        let mut table = CallPathTable::new();
        let first = table.intern_root_first([FrameId(0), FrameId(1), FrameId(2)]);
        let second = table.intern_root_first([FrameId(0), FrameId(1), FrameId(2)]);

        assert_eq!(first, second);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_shared_suffix_stored_once() {
        let mut table = CallPathTable::new();
        table.intern_root_first([FrameId(0), FrameId(1), FrameId(2)]);
        table.intern_root_first([FrameId(0), FrameId(1), FrameId(3)]);

        // root and middle are shared, two distinct leaves
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_caller_precedes_callee() {
        let mut table = CallPathTable::new();
        let leaf = table
            .intern_root_first([FrameId(5), FrameId(6), FrameId(7)])
            .unwrap();

        for (id, node) in table.iter() {
            if let Some(caller) = node.caller {
                assert!(caller < id);
            }
        }
        assert_eq!(table.depth(leaf), 3);
        assert_eq!(
            table.frames_leaf_to_root(leaf),
            vec![FrameId(7), FrameId(6), FrameId(5)]
        );
    }

    #[test]
    fn test_empty_path() {
        let mut table = CallPathTable::new();
        assert!(table.intern_root_first(Vec::new()).is_none());
        assert!(table.is_empty());
    }
}
