use lodview_common::Extent2;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::framebuffer::{AttachmentSlot, Incompleteness};

/// Identity of one GPU allocation.
///
/// Every (re)allocation gets a fresh id, so anything that recorded the id of
/// an image can tell when it has been replaced and must be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

impl ResourceId {
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pixel formats used by render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bits per channel RGBA.
    Rgba8Unorm,
    /// 32-bit float depth.
    Depth32Float,
}

impl PixelFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, PixelFormat::Depth32Float)
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8Unorm | PixelFormat::Depth32Float => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Sampling and storage parameters fixed at allocation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureParams {
    pub wrap: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_levels: u32,
}

impl TextureParams {
    /// Edge-clamped, nearest-neighbour, single mip level.
    pub const RENDER_TARGET: Self = Self {
        wrap: WrapMode::ClampToEdge,
        min_filter: FilterMode::Nearest,
        mag_filter: FilterMode::Nearest,
        mip_levels: 1,
    };
}

impl Default for TextureParams {
    fn default() -> Self {
        Self::RENDER_TARGET
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub extent: Extent2,
    pub format: PixelFormat,
    pub params: TextureParams,
}

/// Storage mode of a linear GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Dynamic-write storage that can be read back.
    Plain,
    /// Large, sparsely populated storage.
    Sparse,
    /// Small constant block bound to shader stages.
    Uniform,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub size: u64,
    pub kind: BufferKind,
}

/// Errors from GPU resource management.
///
/// None of these are recovered locally: a missing render target makes
/// rendering meaningless, so callers log and shut down.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("failed to allocate {label}: {reason}")]
    Allocation { label: String, reason: String },
    #[error("framebuffer {framebuffer} incomplete at {slot}: {reason}")]
    Incomplete {
        framebuffer: ResourceId,
        slot: AttachmentSlot,
        reason: Incompleteness,
    },
    #[error("buffer size must be non-zero")]
    ZeroSizedBuffer,
    #[error("range {offset}..{offset}+{len} exceeds buffer of {size} bytes")]
    OutOfRange { offset: u64, len: u64, size: u64 },
    #[error("buffer readback failed: {0}")]
    Readback(String),
    #[error("surface error: {0}")]
    Surface(String),
}

/// Device capability handed to every resource creation call.
///
/// Resources never store the device; whoever resizes or reads them passes it
/// in again. Dropping a raw texture or buffer releases the GPU object.
pub trait GpuDevice {
    type Texture;
    type Buffer;

    fn create_texture(&self, desc: &TextureDesc<'_>) -> Result<Self::Texture, GpuError>;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<Self::Buffer, GpuError>;

    /// Upload `data` at `offset`. The range has already been validated.
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8])
    -> Result<(), GpuError>;

    /// Copy `len` bytes at `offset` back to the host, blocking until the GPU
    /// has finished pending writes to the buffer. The range has already been
    /// validated.
    fn read_buffer(&self, buffer: &Self::Buffer, offset: u64, len: u64)
    -> Result<Vec<u8>, GpuError>;
}
