//! Shared types for the lodview workspace.
//!
//! # Invariants
//! - `Extent2` is the only currency for sizes between the window, the camera
//!   and GPU resources.
//! - Queued tasks run on the frame thread, in enqueue order, never concurrently
//!   with a frame step.

pub mod queue;
pub mod types;

pub use queue::{QueueClosed, TaskQueue, TaskSender};
pub use types::Extent2;

pub fn crate_info() -> &'static str {
    "lodview-common v0.1.0"
}
