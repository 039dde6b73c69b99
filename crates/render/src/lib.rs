//! Frame driver and GPU resource management, independent of the graphics API.
//!
//! # Invariants
//! - A texture holds storage exactly when its extent is non-empty; every
//!   allocation carries a fresh [`ResourceId`].
//! - Every framebuffer attachment has the framebuffer's extent.
//! - Reconciling a resource at its current size never recreates GPU objects.
//! - `camera.view == camera.world.inverse()` after every `Camera::update`.
//! - The frame sequence runs in a fixed order, once per visual frame.
//!
//! Backends implement [`GpuDevice`] for resource creation and
//! [`FrameBackend`] for presentation. [`headless`] provides both without a
//! GPU.

mod buffer;
mod camera;
mod config;
mod controls;
mod diagnostics;
mod driver;
mod framebuffer;
pub mod headless;
mod plot;
mod resource;
mod texture;
mod timing;

pub use buffer::GpuBuffer;
pub use camera::Camera;
pub use config::DriverConfig;
pub use controls::{Controls, FixedControls};
pub use diagnostics::{DiagnosticFilter, Severity};
pub use driver::{
    FrameBackend, FrameDriver, FrameOutcome, FrameState, RenderContext, Scene, TOGGLE_GUI_LABEL,
    UpdateContext,
};
pub use framebuffer::{AttachmentSlot, BlitRegion, Framebuffer, Incompleteness, Viewport};
pub use plot::{PerfPanel, PerfPlot, ScrollingBuffer};
pub use resource::{
    BufferDesc, BufferKind, FilterMode, GpuDevice, GpuError, PixelFormat, ResourceId, TextureDesc,
    TextureParams, WrapMode,
};
pub use texture::Texture;
pub use timing::{FrameTimer, FrameTiming};

pub fn crate_info() -> &'static str {
    "lodview-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
