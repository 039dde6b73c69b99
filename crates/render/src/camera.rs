use glam::{DMat4, DVec3};
use lodview_common::Extent2;

/// Perspective camera driven by an externally supplied world transform.
///
/// `world` is the camera's placement in the scene and is written by the
/// controls every frame. `view` and `proj` are derived in [`Camera::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: DVec3,
    pub world: DMat4,
    pub view: DMat4,
    pub proj: DMat4,
    pub aspect: f64,
    /// Vertical field of view in degrees.
    pub fovy: f64,
    pub near: f64,
    pub far: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            world: DMat4::IDENTITY,
            view: DMat4::IDENTITY,
            proj: DMat4::IDENTITY,
            aspect: 1.0,
            fovy: 60.0,
            near: 0.1,
            far: 2_000_000.0,
            width: 128,
            height: 128,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the viewport size and derive the aspect ratio from it.
    ///
    /// A zero height yields a non-finite aspect; callers skip empty extents.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.aspect = f64::from(width) / f64::from(height);
    }

    pub fn set_extent(&mut self, extent: Extent2) {
        self.set_size(extent.width, extent.height);
    }

    pub fn extent(&self) -> Extent2 {
        Extent2::new(self.width, self.height)
    }

    /// Recompute `view` and `proj` from `world` and the current aspect.
    pub fn update(&mut self) {
        self.view = self.world.inverse();
        self.proj = DMat4::perspective_rh(self.fovy.to_radians(), self.aspect, self.near, self.far);
    }

    /// Copy a world transform in, placing the camera at its origin.
    pub fn set_world(&mut self, world: DMat4) {
        self.world = world;
        self.position = world.transform_point3(DVec3::ZERO);
    }

    /// Projection times view, in single precision for upload.
    pub fn view_proj_f32(&self) -> glam::Mat4 {
        (self.proj * self.view).as_mat4()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cam = Camera::default();
        assert_eq!(cam.fovy, 60.0);
        assert_eq!(cam.near, 0.1);
        assert_eq!(cam.far, 2_000_000.0);
        assert_eq!((cam.width, cam.height), (128, 128));
        assert_eq!(cam.aspect, 1.0);
    }

    #[test]
    fn aspect_follows_size() {
        let mut cam = Camera::new();
        cam.set_size(800, 600);
        cam.update();
        assert!((cam.aspect - 800.0 / 600.0).abs() < 1e-12);
        assert_eq!(cam.extent(), Extent2::new(800, 600));
    }

    #[test]
    fn view_inverts_world() {
        let mut cam = Camera::new();
        let world = DMat4::from_rotation_translation(
            glam::DQuat::from_rotation_y(0.7),
            DVec3::new(3.0, -2.0, 10.0),
        );
        cam.set_world(world);
        cam.set_size(1920, 1080);
        cam.update();
        let product = cam.view * cam.world;
        assert!(product.abs_diff_eq(DMat4::IDENTITY, 1e-9));
        assert!(cam.position.abs_diff_eq(DVec3::new(3.0, -2.0, 10.0), 1e-12));
    }

    #[test]
    fn projection_matches_perspective() {
        let mut cam = Camera::new();
        cam.set_size(640, 480);
        cam.update();
        let expected = DMat4::perspective_rh(60f64.to_radians(), 640.0 / 480.0, 0.1, 2_000_000.0);
        assert!(cam.proj.abs_diff_eq(expected, 1e-12));
    }

    #[test]
    fn update_is_repeatable() {
        let mut cam = Camera::new();
        cam.set_world(DMat4::from_translation(DVec3::new(0.0, 5.0, 0.0)));
        cam.update();
        let first = cam.clone();
        cam.update();
        assert_eq!(cam, first);
    }
}
