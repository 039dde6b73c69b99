use lodview_common::Extent2;

use crate::resource::{GpuDevice, GpuError, PixelFormat, ResourceId, TextureDesc, TextureParams};

struct Allocation<T> {
    id: ResourceId,
    raw: T,
}

/// One 2D image whose storage is recreated whenever its size changes.
///
/// Storage is immutable once allocated, so a resize destroys the old image and
/// allocates a new one with a new [`ResourceId`]. The texture holds an
/// allocation if and only if its extent is non-empty.
pub struct Texture<D: GpuDevice> {
    label: String,
    format: PixelFormat,
    params: TextureParams,
    extent: Extent2,
    allocation: Option<Allocation<D::Texture>>,
}

impl<D: GpuDevice> Texture<D> {
    /// An unallocated 0x0 texture.
    pub fn empty(label: impl Into<String>, format: PixelFormat) -> Self {
        Self {
            label: label.into(),
            format,
            params: TextureParams::RENDER_TARGET,
            extent: Extent2::ZERO,
            allocation: None,
        }
    }

    /// A texture with storage for `extent`.
    pub fn create(
        device: &D,
        label: impl Into<String>,
        extent: Extent2,
        format: PixelFormat,
    ) -> Result<Self, GpuError> {
        let mut texture = Self::empty(label, format);
        texture.reallocate_if_size_changed(device, extent)?;
        Ok(texture)
    }

    /// Destroy and reallocate the image if `extent` differs from the current
    /// size. Returns whether anything changed.
    ///
    /// When this returns `Ok(true)` every previously observed id and raw handle
    /// is stale.
    pub fn reallocate_if_size_changed(
        &mut self,
        device: &D,
        extent: Extent2,
    ) -> Result<bool, GpuError> {
        if extent == self.extent {
            return Ok(false);
        }

        self.allocation = None;
        self.extent = Extent2::ZERO;

        if extent.is_empty() {
            self.extent = extent;
            return Ok(true);
        }

        let raw = device.create_texture(&TextureDesc {
            label: &self.label,
            extent,
            format: self.format,
            params: self.params,
        })?;
        let id = ResourceId::next();
        tracing::debug!(label = %self.label, %extent, %id, "texture allocated");

        self.allocation = Some(Allocation { id, raw });
        self.extent = extent;
        Ok(true)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn params(&self) -> TextureParams {
        self.params
    }

    pub fn extent(&self) -> Extent2 {
        self.extent
    }

    pub fn is_allocated(&self) -> bool {
        self.allocation.is_some()
    }

    /// Id of the current allocation.
    pub fn id(&self) -> Option<ResourceId> {
        self.allocation.as_ref().map(|a| a.id)
    }

    /// Backend handle of the current allocation.
    pub fn raw(&self) -> Option<&D::Texture> {
        self.allocation.as_ref().map(|a| &a.raw)
    }
}

impl<D: GpuDevice> std::fmt::Debug for Texture<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("label", &self.label)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("id", &self.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;

    #[test]
    fn starts_empty_and_unallocated() {
        let tex: Texture<HeadlessDevice> = Texture::empty("t", PixelFormat::Rgba8Unorm);
        assert_eq!(tex.extent(), Extent2::ZERO);
        assert!(!tex.is_allocated());
        assert!(tex.id().is_none());
    }

    #[test]
    fn same_size_twice_allocates_once() {
        let device = HeadlessDevice::new();
        for (w, h) in [(1, 1), (128, 128), (800, 600), (1920, 1080), (3, 7000)] {
            let mut tex = Texture::empty("t", PixelFormat::Rgba8Unorm);
            let before = device.textures_created();
            assert!(tex.reallocate_if_size_changed(&device, Extent2::new(w, h)).unwrap());
            assert!(!tex.reallocate_if_size_changed(&device, Extent2::new(w, h)).unwrap());
            assert_eq!(device.textures_created() - before, 1);
        }
    }

    #[test]
    fn resize_replaces_the_image() {
        let device = HeadlessDevice::new();
        let mut tex =
            Texture::create(&device, "t", Extent2::new(64, 64), PixelFormat::Rgba8Unorm).unwrap();
        let first = tex.id().unwrap();
        assert_eq!(device.textures_live(), 1);

        tex.reallocate_if_size_changed(&device, Extent2::new(32, 16))
            .unwrap();
        let second = tex.id().unwrap();

        assert_ne!(first, second);
        assert_eq!(tex.raw().unwrap().extent, Extent2::new(32, 16));
        assert_eq!(device.textures_live(), 1, "old image must be destroyed");
        assert_eq!(device.textures_created(), 2);
    }

    #[test]
    fn idempotent_for_any_history() {
        let device = HeadlessDevice::new();
        let mut tex = Texture::empty("t", PixelFormat::Depth32Float);
        let history = [(10, 10), (20, 10), (10, 10), (10, 10), (5, 5), (5, 5)];
        let mut expected = 0;
        let mut last = Extent2::ZERO;
        for (w, h) in history {
            let extent = Extent2::new(w, h);
            if extent != last {
                expected += 1;
            }
            tex.reallocate_if_size_changed(&device, extent).unwrap();
            last = extent;
        }
        assert_eq!(device.textures_created(), expected);
    }

    #[test]
    fn empty_extent_releases_storage() {
        let device = HeadlessDevice::new();
        let mut tex =
            Texture::create(&device, "t", Extent2::new(8, 8), PixelFormat::Rgba8Unorm).unwrap();
        assert!(tex.reallocate_if_size_changed(&device, Extent2::new(0, 8)).unwrap());
        assert!(!tex.is_allocated());
        assert_eq!(device.textures_live(), 0);
    }

    #[test]
    fn failed_allocation_leaves_texture_unallocated() {
        let device = HeadlessDevice::new();
        let mut tex =
            Texture::create(&device, "t", Extent2::new(8, 8), PixelFormat::Rgba8Unorm).unwrap();
        device.fail_next_texture();
        let err = tex
            .reallocate_if_size_changed(&device, Extent2::new(16, 16))
            .unwrap_err();
        assert!(matches!(err, GpuError::Allocation { .. }));
        assert!(!tex.is_allocated());
        assert_eq!(tex.extent(), Extent2::ZERO);
    }
}
