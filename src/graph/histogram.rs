//! Per-type size histogram over a memory graph.

use super::memory_graph::{MemoryGraph, NodeTypeIndex};
use crate::utils::error::Cancelled;
use crate::work::CancellationToken;
use log::debug;
use serde::Serialize;
use std::convert::Infallible;

/// Aggregate of all nodes sharing one type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeHistogramEntry {
    pub type_index: NodeTypeIndex,
    pub type_name: String,
    pub count: usize,
    pub total_size: u64,
}

// Nodes between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 4096;

impl MemoryGraph {
    /// Count and size per type, dropping types whose total is below `min_size`.
    ///
    /// Sorted by total size descending, then type name, then type index.
    pub fn histogram_by_type(&self, min_size: u64) -> Vec<TypeHistogramEntry> {
        match self.histogram_inner(min_size, || Ok::<(), Infallible>(())) {
            Ok(entries) => entries,
            Err(never) => match never {},
        }
    }

    /// Same as `histogram_by_type`, checking `cancel` while walking nodes
    pub fn histogram_by_type_cancellable(
        &self,
        min_size: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<TypeHistogramEntry>, Cancelled> {
        self.histogram_inner(min_size, || cancel.check())
    }

    fn histogram_inner<E>(
        &self,
        min_size: u64,
        mut check: impl FnMut() -> Result<(), E>,
    ) -> Result<Vec<TypeHistogramEntry>, E> {
        let mut counts = vec![0usize; self.type_index_limit()];
        let mut sizes = vec![0u64; self.type_index_limit()];

        for i in 0..self.node_index_limit() {
            if i % CANCEL_CHECK_INTERVAL == 0 {
                check()?;
            }
            let type_index = self.node_type_index(i).index();
            counts[type_index] += 1;
            sizes[type_index] = sizes[type_index].saturating_add(self.node_size(i));
        }

        let mut entries: Vec<TypeHistogramEntry> = self
            .types()
            .filter(|(index, _)| counts[index.index()] > 0 && sizes[index.index()] >= min_size)
            .map(|(index, node_type)| TypeHistogramEntry {
                type_index: index,
                type_name: node_type.full_name(),
                count: counts[index.index()],
                total_size: sizes[index.index()],
            })
            .collect();

        entries.sort_by(|a, b| {
            b.total_size
                .cmp(&a.total_size)
                .then_with(|| a.type_name.cmp(&b.type_name))
                .then_with(|| a.type_index.cmp(&b.type_index))
        });

        debug!(
            "Histogram: {} of {} types at or above {} bytes",
            entries.len(),
            self.type_index_limit(),
            min_size
        );
        Ok(entries)
    }
}
