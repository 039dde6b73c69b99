//! wgpu backend for the lodview frame driver.
//!
//! Implements the resource interface on a wgpu device, presents the primary
//! framebuffer through a window surface and draws the diagnostic overlay with
//! egui. The crate does not depend on a window toolkit: the adapter passes a
//! surface target in and forwards events and overlay input.
//!
//! # Invariants
//! - Offscreen color targets are `Rgba8Unorm`; the surface prefers a linear
//!   format so the blit copies values through unchanged.
//! - Bind groups that reference a texture are rebuilt when its allocation id
//!   changes.
//! - GPU driver messages go through the diagnostic filter and never abort.

mod backend;
mod blit;
mod config;
mod device;
mod gpu;
mod grid;
mod overlay;
mod shaders;

pub use backend::{WgpuBackend, WgpuFrame};
pub use blit::Blitter;
pub use config::{PowerPreference, ViewerConfig};
pub use device::{WgpuBuffer, WgpuDevice, WgpuTexture, buffer_usage};
pub use gpu::GpuContext;
pub use grid::GridScene;
pub use overlay::EguiOverlay;

pub fn crate_info() -> &'static str {
    "lodview-render-wgpu v0.1.0"
}
