//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the library components on a shared `Session`.

pub mod capture;
pub mod diff;
pub mod events;
pub mod heap;
pub mod models;
pub mod stacks;
pub mod utils;

// Re-export main command functions
pub use capture::execute_capture;
pub use diff::execute_diff;
pub use events::execute_events;
pub use heap::execute_heap;
pub use models::{CaptureArgs, DiffArgs, EventsArgs, HeapArgs, StacksArgs};
pub use stacks::{execute_stacks, execute_streams};
pub use utils::Session;
