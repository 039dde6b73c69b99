use glam::{DMat4, DVec3};
use lodview_input::InputEvent;

/// Camera control algorithm.
///
/// Consumes raw input and exposes the camera's world transform. The frame
/// driver calls `update` once per frame and copies `world` into the camera.
pub trait Controls {
    fn update(&mut self) {}

    fn world(&self) -> DMat4;

    fn handle_event(&mut self, _event: &InputEvent) {}
}

/// Controls that hold a constant transform and ignore input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedControls {
    world: DMat4,
}

impl Default for FixedControls {
    fn default() -> Self {
        Self::new(DMat4::IDENTITY)
    }
}

impl FixedControls {
    pub fn new(world: DMat4) -> Self {
        Self { world }
    }

    /// Place the camera at `eye` looking at `target`.
    pub fn look_at(eye: DVec3, target: DVec3, up: DVec3) -> Self {
        Self::new(DMat4::look_at_rh(eye, target, up).inverse())
    }

    pub fn set_world(&mut self, world: DMat4) {
        self.world = world;
    }
}

impl Controls for FixedControls {
    fn world(&self) -> DMat4 {
        self.world
    }
}
