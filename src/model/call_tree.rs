//! Aggregated call tree built from a stack source.
//!
//! Samples with the same root-first sequence of frame names merge into one
//! node. Each node carries inclusive (self plus descendants) and exclusive
//! metric. Diff sources aggregate naturally: negative baseline samples
//! subtract from the same nodes the data samples add to.

use super::sample::TimeRange;
use super::stack_source::StackSource;
use log::debug;
use std::collections::HashMap;

/// Name of the synthetic node every tree hangs from
pub const CALL_TREE_ROOT: &str = "ROOT";

/// One merged node of the call tree
#[derive(Debug, Clone, PartialEq)]
pub struct CallTreeNode {
    pub name: String,
    pub inclusive: f64,
    pub exclusive: f64,
    pub sample_count: usize,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl CallTreeNode {
    fn new(name: String, parent: Option<usize>) -> Self {
        Self {
            name,
            inclusive: 0.0,
            exclusive: 0.0,
            sample_count: 0,
            parent,
            children: Vec::new(),
        }
    }
}

/// Arena-allocated call tree
#[derive(Debug, Clone)]
pub struct CallTree {
    nodes: Vec<CallTreeNode>,
    child_index: HashMap<(usize, String), usize>,
    absolute_total: f64,
}

impl CallTree {
    fn empty() -> Self {
        Self {
            nodes: vec![CallTreeNode::new(CALL_TREE_ROOT.to_string(), None)],
            child_index: HashMap::new(),
            absolute_total: 0.0,
        }
    }

    /// Aggregate every sample of `source` inside `range`
    pub fn build(source: &StackSource, range: TimeRange) -> Self {
        let mut tree = Self::empty();
        let paths = source.call_paths();

        // Callers precede callees, so each path's node is known before its children.
        let mut node_for_path: Vec<usize> = Vec::with_capacity(paths.len());
        for (_, node) in paths.iter() {
            let parent = node
                .caller
                .map_or(0, |caller| node_for_path[caller.index()]);
            let name = source.frame_display_name(node.frame);
            node_for_path.push(tree.child(parent, name));
        }

        for sample in source.enumerate(range) {
            let leaf = node_for_path[sample.call_path.index()];
            tree.nodes[leaf].exclusive += sample.metric;
            tree.nodes[leaf].sample_count += 1;
            tree.absolute_total += sample.metric.abs();

            let mut current = Some(leaf);
            while let Some(index) = current {
                tree.nodes[index].inclusive += sample.metric;
                current = tree.nodes[index].parent;
            }
        }

        debug!(
            "Built call tree for '{}' with {} nodes",
            source.name(),
            tree.nodes.len()
        );
        tree
    }

    fn child(&mut self, parent: usize, name: String) -> usize {
        if let Some(&index) = self.child_index.get(&(parent, name.clone())) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(CallTreeNode::new(name.clone(), Some(parent)));
        self.nodes[parent].children.push(index);
        self.child_index.insert((parent, name), index);
        index
    }

    pub fn root(&self) -> &CallTreeNode {
        &self.nodes[0]
    }

    /// Sum of absolute sample metrics; the base for percentages
    pub fn absolute_total(&self) -> f64 {
        self.absolute_total
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node by arena index; index 0 is the synthetic root
    pub fn node(&self, index: usize) -> Option<&CallTreeNode> {
        self.nodes.get(index)
    }

    /// Children of the node at `index`, in first-seen order
    pub fn children(&self, index: usize) -> impl Iterator<Item = (usize, &CallTreeNode)> + '_ {
        self.nodes
            .get(index)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |&child| (child, &self.nodes[child]))
    }

    /// Find the node reached by following `path` (root first) from the synthetic root
    pub fn node_at(&self, path: &[&str]) -> Option<&CallTreeNode> {
        let mut current = 0;
        for name in path {
            current = *self.child_index.get(&(current, (*name).to_string()))?;
        }
        self.nodes.get(current)
    }

    /// Merge every node whose |inclusive| is below `percent` of the absolute
    /// total into its parent's exclusive metric
    pub fn fold_below_percent(&self, percent: f64) -> CallTree {
        let threshold = self.absolute_total * percent / 100.0;
        let mut folded = Self::empty();
        folded.absolute_total = self.absolute_total;
        folded.nodes[0].inclusive = self.nodes[0].inclusive;
        folded.nodes[0].exclusive = self.nodes[0].exclusive;
        folded.nodes[0].sample_count = self.nodes[0].sample_count;

        // (source index, destination index)
        let mut pending = vec![(0usize, 0usize)];
        while let Some((from, to)) = pending.pop() {
            for &child in &self.nodes[from].children {
                let node = &self.nodes[child];
                if node.inclusive.abs() < threshold {
                    folded.nodes[to].exclusive += node.inclusive;
                    folded.nodes[to].sample_count += self.subtree_sample_count(child);
                    continue;
                }
                let copy = folded.child(to, node.name.clone());
                folded.nodes[copy].inclusive = node.inclusive;
                folded.nodes[copy].exclusive = node.exclusive;
                folded.nodes[copy].sample_count = node.sample_count;
                pending.push((child, copy));
            }
        }
        folded
    }

    fn subtree_sample_count(&self, index: usize) -> usize {
        let mut count = 0;
        let mut pending = vec![index];
        while let Some(current) = pending.pop() {
            count += self.nodes[current].sample_count;
            pending.extend(self.nodes[current].children.iter().copied());
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StackSourceBuilder;

    fn tree_source() -> StackSource {
        let mut builder = StackSourceBuilder::new("cpu", "msec");
        builder.add_stack(["main", "foo"], 10.0, 0.0, None);
        builder.add_stack(["main", "foo", "bar"], 4.0, 1.0, None);
        builder.add_stack(["main"], 1.0, 2.0, None);
        builder.add_stack(["main", "tiny"], 0.1, 3.0, None);
        builder.build()
    }

    #[test]
    fn test_inclusive_and_exclusive() {
        let tree = CallTree::build(&tree_source(), TimeRange::ALL);

        let main = tree.node_at(&["main"]).unwrap();
        assert!((main.inclusive - 15.1).abs() < 1e-9);
        assert_eq!(main.exclusive, 1.0);

        let foo = tree.node_at(&["main", "foo"]).unwrap();
        assert_eq!(foo.inclusive, 14.0);
        assert_eq!(foo.exclusive, 10.0);
        assert_eq!(foo.sample_count, 1);
    }

    #[test]
    fn test_range_limits_aggregation() {
        let tree = CallTree::build(&tree_source(), TimeRange::new(1.0, 2.0));
        assert_eq!(tree.root().inclusive, 4.0);
        assert!(tree.node_at(&["main", "foo", "bar"]).is_some());
    }

    #[test]
    fn test_fold_below_percent_moves_cost_to_parent() {
        let tree = CallTree::build(&tree_source(), TimeRange::ALL);
        let folded = tree.fold_below_percent(1.0);

        assert!(folded.node_at(&["main", "tiny"]).is_none());
        let main = folded.node_at(&["main"]).unwrap();
        assert!((main.exclusive - 1.1).abs() < 1e-9);
        assert!((main.inclusive - 15.1).abs() < 1e-9);
    }

    #[test]
    fn test_missing_path() {
        let tree = CallTree::build(&tree_source(), TimeRange::ALL);
        assert!(tree.node_at(&["nope"]).is_none());
    }
}
