use glam::UVec2;
use serde::{Deserialize, Serialize};

/// Width and height in physical pixels.
///
/// Used for window sizes, camera viewports and GPU resource dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2 {
    pub width: u32,
    pub height: u32,
}

impl Extent2 {
    pub const ZERO: Self = Self::new(0, 0);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero. Nothing can be allocated or rendered
    /// at an empty extent.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width divided by height. Callers must not pass an empty extent.
    pub fn aspect(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn as_uvec2(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}

impl From<(u32, u32)> for Extent2 {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Extent2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_of_800_by_600() {
        let e = Extent2::new(800, 600);
        assert!((e.aspect() - 800.0 / 600.0).abs() < 1e-12);
    }

    #[test]
    fn empty_when_any_dimension_is_zero() {
        assert!(Extent2::ZERO.is_empty());
        assert!(Extent2::new(0, 10).is_empty());
        assert!(Extent2::new(10, 0).is_empty());
        assert!(!Extent2::new(1, 1).is_empty());
    }

    #[test]
    fn display_and_conversions() {
        let e: Extent2 = (1920, 1080).into();
        assert_eq!(format!("{e}"), "1920x1080");
        assert_eq!(e.area(), 1920 * 1080);
        assert_eq!(e.as_uvec2(), UVec2::new(1920, 1080));
    }
}
