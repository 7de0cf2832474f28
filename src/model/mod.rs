//! The stack sample model.
//!
//! This module defines:
//! - Frame and call path interning
//! - Samples and closed-open time windows
//! - The immutable `StackSource` and its builder
//! - Grouping/folding rules and call tree aggregation

pub mod call_path;
pub mod call_tree;
pub mod grouping;
pub mod interner;
pub mod sample;
pub mod stack_source;

// Re-export main types
pub use call_path::{CallPathId, CallPathNode, CallPathTable};
pub use call_tree::{CallTree, CallTreeNode};
pub use grouping::GroupingRule;
pub use interner::{Frame, FrameId, FrameInterner};
pub use sample::{Sample, TimeRange};
pub use stack_source::{StackSource, StackSourceBuilder};
