use lodview_common::Extent2;

use crate::resource::{FilterMode, GpuDevice, GpuError, PixelFormat, ResourceId};
use crate::texture::Texture;

/// Attachment point of a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentSlot {
    Color(usize),
    Depth,
}

impl std::fmt::Display for AttachmentSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachmentSlot::Color(i) => write!(f, "color[{i}]"),
            AttachmentSlot::Depth => f.write_str("depth"),
        }
    }
}

/// Why a framebuffer failed its completeness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incompleteness {
    /// The attachment has no storage.
    Unallocated,
    /// The slot still refers to an older image than the attachment holds.
    Unbound,
    SizeMismatch { expected: Extent2, actual: Extent2 },
    WrongFormat(PixelFormat),
    NoColorAttachment,
    NoSuchSlot,
}

impl std::fmt::Display for Incompleteness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Incompleteness::Unallocated => f.write_str("attachment has no storage"),
            Incompleteness::Unbound => f.write_str("attachment not bound"),
            Incompleteness::SizeMismatch { expected, actual } => {
                write!(f, "attachment is {actual}, framebuffer is {expected}")
            }
            Incompleteness::WrongFormat(format) => {
                write!(f, "format {format:?} not valid for this slot")
            }
            Incompleteness::NoColorAttachment => f.write_str("no color attachment"),
            Incompleteness::NoSuchSlot => f.write_str("slot does not exist"),
        }
    }
}

/// Pixel rectangle that rendering is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub extent: Extent2,
}

impl Viewport {
    pub fn full(extent: Extent2) -> Self {
        Self { x: 0, y: 0, extent }
    }

    /// Whether the rectangle lies inside a target of `target` size.
    pub fn fits(&self, target: Extent2) -> bool {
        u64::from(self.x) + u64::from(self.extent.width) <= u64::from(target.width)
            && u64::from(self.y) + u64::from(self.extent.height) <= u64::from(target.height)
    }
}

/// Source and destination rectangles of a color copy between render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitRegion {
    pub src: Viewport,
    pub dst: Viewport,
    pub filter: FilterMode,
}

/// Offscreen render target: an ordered set of color textures plus one depth
/// texture, all sharing the framebuffer's size.
///
/// The framebuffer records, per slot, the [`ResourceId`] it last bound. A slot
/// whose attachment now carries a different id is stale and is rebound on the
/// next reconciliation. Attachment count and formats never change after
/// construction.
pub struct Framebuffer<D: GpuDevice> {
    id: ResourceId,
    color: Vec<Texture<D>>,
    depth: Texture<D>,
    /// Color slots in order, then the depth slot.
    bindings: Vec<Option<ResourceId>>,
    extent: Extent2,
    rebinds: u64,
}

impl<D: GpuDevice> Framebuffer<D> {
    /// One RGBA8 color attachment and a 32-bit float depth attachment.
    pub fn new(device: &D, extent: Extent2) -> Result<Self, GpuError> {
        Self::with_color_formats(device, "framebuffer", &[PixelFormat::Rgba8Unorm], extent)
    }

    pub fn with_color_formats(
        device: &D,
        label: &str,
        formats: &[PixelFormat],
        extent: Extent2,
    ) -> Result<Self, GpuError> {
        let id = ResourceId::next();
        if formats.is_empty() {
            return Err(GpuError::Incomplete {
                framebuffer: id,
                slot: AttachmentSlot::Color(0),
                reason: Incompleteness::NoColorAttachment,
            });
        }
        if let Some((i, format)) = formats.iter().enumerate().find(|(_, f)| f.is_depth()) {
            return Err(GpuError::Incomplete {
                framebuffer: id,
                slot: AttachmentSlot::Color(i),
                reason: Incompleteness::WrongFormat(*format),
            });
        }

        let color: Vec<Texture<D>> = formats
            .iter()
            .enumerate()
            .map(|(i, format)| Texture::empty(format!("{label}.color{i}"), *format))
            .collect();
        let depth = Texture::empty(format!("{label}.depth"), PixelFormat::Depth32Float);

        let mut framebuffer = Self {
            id,
            bindings: vec![None; color.len() + 1],
            color,
            depth,
            extent: Extent2::ZERO,
            rebinds: 0,
        };
        framebuffer.rebind_stale();
        framebuffer.reallocate_if_size_changed(device, extent)?;
        framebuffer.check_complete()?;

        tracing::debug!(framebuffer = %id, %extent, attachments = formats.len() + 1, "framebuffer created");
        Ok(framebuffer)
    }

    /// Resize every attachment to `extent` if it differs from the current
    /// size, rebinding each one after it is recreated. Returns whether
    /// anything was reallocated.
    ///
    /// At an unchanged size no GPU object is touched, but slots whose
    /// attachment identity changed since the last bind are still rebound.
    pub fn reallocate_if_size_changed(
        &mut self,
        device: &D,
        extent: Extent2,
    ) -> Result<bool, GpuError> {
        if extent == self.extent {
            self.rebind_stale();
            return Ok(false);
        }

        for i in 0..self.color.len() {
            self.color[i].reallocate_if_size_changed(device, extent)?;
            self.bind(AttachmentSlot::Color(i));
        }
        self.depth.reallocate_if_size_changed(device, extent)?;
        self.bind(AttachmentSlot::Depth);

        tracing::debug!(framebuffer = %self.id, from = %self.extent, to = %extent, "framebuffer reallocated");
        self.extent = extent;
        Ok(true)
    }

    /// Swap in a new color attachment at `index`, returning the old one.
    ///
    /// The texture is resized to the framebuffer's extent and bound at once.
    pub fn replace_color_attachment(
        &mut self,
        device: &D,
        index: usize,
        mut texture: Texture<D>,
    ) -> Result<Texture<D>, GpuError> {
        let slot = AttachmentSlot::Color(index);
        let Some(current) = self.color.get(index) else {
            return Err(self.incomplete(slot, Incompleteness::NoSuchSlot));
        };
        if texture.format() != current.format() {
            return Err(self.incomplete(slot, Incompleteness::WrongFormat(texture.format())));
        }

        texture.reallocate_if_size_changed(device, self.extent)?;
        let old = std::mem::replace(&mut self.color[index], texture);
        self.bind(slot);
        Ok(old)
    }

    /// Validate that every attachment is allocated, bound, correctly sized
    /// and of a format valid for its slot.
    pub fn check_complete(&self) -> Result<(), GpuError> {
        for slot in self.slots() {
            let Some(texture) = self.attachment(slot) else {
                return Err(self.incomplete(slot, Incompleteness::NoSuchSlot));
            };
            let Some(id) = texture.id() else {
                return Err(self.incomplete(slot, Incompleteness::Unallocated));
            };
            if self.bound_id(slot) != Some(id) {
                return Err(self.incomplete(slot, Incompleteness::Unbound));
            }
            if texture.extent() != self.extent {
                return Err(self.incomplete(
                    slot,
                    Incompleteness::SizeMismatch {
                        expected: self.extent,
                        actual: texture.extent(),
                    },
                ));
            }
            let depth_slot = slot == AttachmentSlot::Depth;
            if texture.format().is_depth() != depth_slot {
                return Err(self.incomplete(slot, Incompleteness::WrongFormat(texture.format())));
            }
        }
        Ok(())
    }

    /// Whole-target copy at the same offset with linear filtering.
    pub fn full_region(&self) -> BlitRegion {
        BlitRegion {
            src: Viewport::full(self.extent),
            dst: Viewport::full(self.extent),
            filter: FilterMode::Linear,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn extent(&self) -> Extent2 {
        self.extent
    }

    pub fn color(&self, index: usize) -> Option<&Texture<D>> {
        self.color.get(index)
    }

    pub fn color_attachments(&self) -> &[Texture<D>] {
        &self.color
    }

    pub fn depth(&self) -> &Texture<D> {
        &self.depth
    }

    pub fn attachment(&self, slot: AttachmentSlot) -> Option<&Texture<D>> {
        match slot {
            AttachmentSlot::Color(i) => self.color.get(i),
            AttachmentSlot::Depth => Some(&self.depth),
        }
    }

    /// Id recorded when `slot` was last bound.
    pub fn bound_id(&self, slot: AttachmentSlot) -> Option<ResourceId> {
        self.binding_index(slot)
            .and_then(|i| self.bindings.get(i).copied().flatten())
    }

    /// Number of slot binds performed since construction.
    pub fn rebind_count(&self) -> u64 {
        self.rebinds
    }

    fn slots(&self) -> impl Iterator<Item = AttachmentSlot> + use<D> {
        (0..self.color.len())
            .map(AttachmentSlot::Color)
            .chain(std::iter::once(AttachmentSlot::Depth))
    }

    fn binding_index(&self, slot: AttachmentSlot) -> Option<usize> {
        match slot {
            AttachmentSlot::Color(i) if i < self.color.len() => Some(i),
            AttachmentSlot::Color(_) => None,
            AttachmentSlot::Depth => Some(self.color.len()),
        }
    }

    fn bind(&mut self, slot: AttachmentSlot) {
        let id = self.attachment(slot).and_then(|t| t.id());
        if let Some(index) = self.binding_index(slot) {
            self.bindings[index] = id;
            self.rebinds += 1;
            tracing::trace!(framebuffer = %self.id, %slot, ?id, "attachment bound");
        }
    }

    fn rebind_stale(&mut self) {
        let stale: Vec<AttachmentSlot> = self
            .slots()
            .filter(|slot| self.attachment(*slot).and_then(|t| t.id()) != self.bound_id(*slot))
            .collect();
        for slot in stale {
            self.bind(slot);
        }
    }

    fn incomplete(&self, slot: AttachmentSlot, reason: Incompleteness) -> GpuError {
        GpuError::Incomplete {
            framebuffer: self.id,
            slot,
            reason,
        }
    }
}

impl<D: GpuDevice> std::fmt::Debug for Framebuffer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("id", &self.id)
            .field("extent", &self.extent)
            .field("color", &self.color)
            .field("depth", &self.depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;

    #[test]
    fn new_has_one_color_and_one_depth() {
        let device = HeadlessDevice::new();
        let fb = Framebuffer::new(&device, Extent2::new(128, 128)).unwrap();
        assert_eq!(fb.color_attachments().len(), 1);
        assert_eq!(fb.color(0).unwrap().format(), PixelFormat::Rgba8Unorm);
        assert_eq!(fb.depth().format(), PixelFormat::Depth32Float);
        assert_eq!(fb.extent(), Extent2::new(128, 128));
        assert_eq!(device.textures_created(), 2);
        fb.check_complete().unwrap();
    }

    #[test]
    fn resize_cascades_to_every_attachment() {
        let device = HeadlessDevice::new();
        let mut fb = Framebuffer::with_color_formats(
            &device,
            "gbuffer",
            &[PixelFormat::Rgba8Unorm, PixelFormat::Rgba8Unorm],
            Extent2::new(128, 128),
        )
        .unwrap();

        for (w, h) in [(800, 600), (1, 1), (4096, 2160)] {
            let extent = Extent2::new(w, h);
            assert!(fb.reallocate_if_size_changed(&device, extent).unwrap());
            for slot in [AttachmentSlot::Color(0), AttachmentSlot::Color(1), AttachmentSlot::Depth] {
                let tex = fb.attachment(slot).unwrap();
                assert_eq!(tex.extent(), extent, "{slot}");
                assert_eq!(fb.bound_id(slot), tex.id());
            }
            fb.check_complete().unwrap();
        }
    }

    #[test]
    fn same_size_touches_nothing() {
        let device = HeadlessDevice::new();
        let mut fb = Framebuffer::new(&device, Extent2::new(320, 200)).unwrap();
        let created = device.textures_created();
        let rebinds = fb.rebind_count();
        for _ in 0..5 {
            assert!(!fb.reallocate_if_size_changed(&device, Extent2::new(320, 200)).unwrap());
        }
        assert_eq!(device.textures_created(), created);
        assert_eq!(fb.rebind_count(), rebinds);
    }

    #[test]
    fn replaced_attachment_is_bound_immediately() {
        let device = HeadlessDevice::new();
        let mut fb = Framebuffer::new(&device, Extent2::new(64, 64)).unwrap();
        let old_id = fb.color(0).unwrap().id();

        let replacement = Texture::empty("custom", PixelFormat::Rgba8Unorm);
        let old = fb.replace_color_attachment(&device, 0, replacement).unwrap();

        assert_eq!(old.id(), old_id);
        let new_id = fb.color(0).unwrap().id();
        assert_ne!(new_id, old_id);
        assert_eq!(fb.bound_id(AttachmentSlot::Color(0)), new_id);
        assert_eq!(fb.color(0).unwrap().extent(), Extent2::new(64, 64));
        fb.check_complete().unwrap();
    }

    #[test]
    fn replacement_must_match_format() {
        let device = HeadlessDevice::new();
        let mut fb = Framebuffer::new(&device, Extent2::new(64, 64)).unwrap();
        let err = fb
            .replace_color_attachment(&device, 0, Texture::empty("d", PixelFormat::Depth32Float))
            .unwrap_err();
        assert!(matches!(
            err,
            GpuError::Incomplete {
                reason: Incompleteness::WrongFormat(PixelFormat::Depth32Float),
                ..
            }
        ));
        let err = fb
            .replace_color_attachment(&device, 3, Texture::empty("c", PixelFormat::Rgba8Unorm))
            .unwrap_err();
        assert!(matches!(
            err,
            GpuError::Incomplete {
                slot: AttachmentSlot::Color(3),
                reason: Incompleteness::NoSuchSlot,
                ..
            }
        ));
    }

    #[test]
    fn empty_extent_is_incomplete() {
        let device = HeadlessDevice::new();
        let err = Framebuffer::new(&device, Extent2::ZERO).unwrap_err();
        assert!(matches!(
            err,
            GpuError::Incomplete {
                reason: Incompleteness::Unallocated,
                ..
            }
        ));
    }

    #[test]
    fn color_slots_reject_depth_formats() {
        let device = HeadlessDevice::new();
        let err = Framebuffer::with_color_formats(
            &device,
            "bad",
            &[PixelFormat::Depth32Float],
            Extent2::new(8, 8),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GpuError::Incomplete {
                slot: AttachmentSlot::Color(0),
                ..
            }
        ));
        assert!(Framebuffer::with_color_formats(&device, "none", &[], Extent2::new(8, 8)).is_err());
    }

    #[test]
    fn full_region_covers_target() {
        let device = HeadlessDevice::new();
        let fb = Framebuffer::new(&device, Extent2::new(800, 600)).unwrap();
        let region = fb.full_region();
        assert_eq!(region.src, Viewport::full(Extent2::new(800, 600)));
        assert_eq!(region.dst, region.src);
        assert_eq!(region.filter, FilterMode::Linear);
        assert!(region.src.fits(fb.extent()));
        assert!(!Viewport { x: 1, ..region.src }.fits(fb.extent()));
    }

    #[test]
    fn slot_display() {
        assert_eq!(AttachmentSlot::Color(2).to_string(), "color[2]");
        assert_eq!(AttachmentSlot::Depth.to_string(), "depth");
    }
}
