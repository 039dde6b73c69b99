//! Input layer: raw window-toolkit events mapped to platform-agnostic types.
//!
//! # Invariants
//! - Session state has a single writer: the frame thread.
//! - Drop listeners receive each drop batch exactly once, in registration order.
//! - Nothing in this crate depends on a window toolkit; adapters live in the apps.

pub mod event;
pub mod handler;
pub mod state;

pub use event::{InputEvent, Key, KeyAction, Modifiers, MouseButton};
pub use handler::{DropListenerId, DropListeners, EventHandler};
pub use state::SessionState;

pub fn crate_info() -> &'static str {
    "lodview-input v0.1.0"
}
