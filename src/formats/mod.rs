//! Input formats and their adapters.
//!
//! This module provides:
//! - The adapter contract (`FormatAdapter`, `DataFile`, `OpenedFile`)
//! - Extension-based dispatch through `FormatRegistry`
//! - One adapter per supported file format
//! - View state persistence shared by the native formats

pub mod adapter;
pub mod alloc_stacks;
pub mod clr_profiler;
pub mod code_size;
pub mod csv_trace;
pub mod debugger_stack;
pub mod gc_heap;
pub mod image_size;
pub mod input;
pub mod native;
pub mod native_json;
pub mod native_xml;
pub mod off_tree;
pub mod process_dump;
pub mod registry;
pub mod tree_xml;
pub mod view_state;
pub mod wt_trace;
pub mod xml_tree;

pub use adapter::{
    CaptureTrigger, DataFile, FormatAdapter, LogicalStream, OpenedFile, StreamDescriptor,
    StreamKind, StreamLoader,
};
pub use process_dump::{CommandCapture, HeapCaptureAction};
pub use registry::FormatRegistry;
pub use view_state::ViewState;

/// Parse a size written in decimal or as `0x` hex
pub(crate) fn parse_size(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
