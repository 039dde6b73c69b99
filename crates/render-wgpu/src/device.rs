use lodview_render::{
    BufferDesc, BufferKind, FilterMode, GpuDevice, GpuError, PixelFormat, TextureDesc, WrapMode,
};
use std::sync::mpsc;

/// Byte alignment wgpu requires for buffer copies and queue writes.
const COPY_ALIGN: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

/// A wgpu device and its queue, implementing the resource interface.
pub struct WgpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    limits: wgpu::Limits,
}

/// Texture, its default view and a sampler matching its parameters.
pub struct WgpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

pub struct WgpuBuffer {
    pub buffer: wgpu::Buffer,
    /// Allocated size, rounded up to the copy alignment.
    pub allocated: u64,
}

pub fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

pub fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

/// Usage flags for each buffer kind.
///
/// wgpu has no sparse residency; sparse buffers are plain storage that wgpu
/// zero-initialises lazily, so untouched ranges read as zeros.
pub fn buffer_usage(kind: BufferKind) -> wgpu::BufferUsages {
    use wgpu::BufferUsages as U;
    match kind {
        BufferKind::Plain => U::STORAGE | U::VERTEX | U::COPY_SRC | U::COPY_DST,
        BufferKind::Sparse => U::STORAGE | U::COPY_SRC | U::COPY_DST,
        BufferKind::Uniform => U::UNIFORM | U::COPY_DST | U::COPY_SRC,
    }
}

fn align_down(value: u64) -> u64 {
    value - value % COPY_ALIGN
}

fn align_up(value: u64) -> u64 {
    value.div_ceil(COPY_ALIGN) * COPY_ALIGN
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let limits = device.limits();
        Self {
            device,
            queue,
            limits,
        }
    }

    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    /// Run `create` inside validation and out-of-memory error scopes.
    fn scoped<T>(&self, label: &str, create: impl FnOnce() -> T) -> Result<T, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let value = create();
        let oom = pollster::block_on(self.device.pop_error_scope());
        let validation = pollster::block_on(self.device.pop_error_scope());
        match oom.or(validation) {
            Some(err) => Err(GpuError::Allocation {
                label: label.to_string(),
                reason: err.to_string(),
            }),
            None => Ok(value),
        }
    }

    /// Copy the aligned range covering `offset..offset + len` into host memory.
    fn read_aligned(&self, buffer: &wgpu::Buffer, start: u64, end: u64) -> Result<Vec<u8>, GpuError> {
        let size = end - start;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, start, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            sender.send(res).ok();
        });
        self.device.poll(wgpu::Maintain::Wait);

        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(GpuError::Readback(err.to_string())),
            Err(_) => return Err(GpuError::Readback("map callback dropped".into())),
        }

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }
}

impl GpuDevice for WgpuDevice {
    type Texture = WgpuTexture;
    type Buffer = WgpuBuffer;

    fn create_texture(&self, desc: &TextureDesc<'_>) -> Result<WgpuTexture, GpuError> {
        let max = self.limits.max_texture_dimension_2d;
        if desc.extent.width > max || desc.extent.height > max {
            return Err(GpuError::Allocation {
                label: desc.label.to_string(),
                reason: format!("{} exceeds the {max}px texture limit", desc.extent),
            });
        }

        let usage = if desc.format.is_depth() {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
        };

        self.scoped(desc.label, || {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(desc.label),
                size: wgpu::Extent3d {
                    width: desc.extent.width,
                    height: desc.extent.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: desc.params.mip_levels,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: texture_format(desc.format),
                usage,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let address = address_mode(desc.params.wrap);
            let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(desc.label),
                address_mode_u: address,
                address_mode_v: address,
                address_mode_w: address,
                mag_filter: filter_mode(desc.params.mag_filter),
                min_filter: filter_mode(desc.params.min_filter),
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });
            WgpuTexture {
                texture,
                view,
                sampler,
            }
        })
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<WgpuBuffer, GpuError> {
        let allocated = align_up(desc.size);
        let limit = match desc.kind {
            BufferKind::Uniform => u64::from(self.limits.max_uniform_buffer_binding_size),
            BufferKind::Plain | BufferKind::Sparse => self.limits.max_buffer_size,
        };
        if allocated > limit {
            return Err(GpuError::Allocation {
                label: desc.label.to_string(),
                reason: format!("{} bytes exceeds the {:?} limit of {limit}", desc.size, desc.kind),
            });
        }

        let buffer = self.scoped(desc.label, || {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.label),
                size: allocated,
                usage: buffer_usage(desc.kind),
                mapped_at_creation: false,
            })
        })?;
        Ok(WgpuBuffer { buffer, allocated })
    }

    fn write_buffer(&self, buffer: &WgpuBuffer, offset: u64, data: &[u8]) -> Result<(), GpuError> {
        if data.is_empty() {
            return Ok(());
        }
        let end = offset + data.len() as u64;
        if offset % COPY_ALIGN == 0 && end % COPY_ALIGN == 0 {
            self.queue.write_buffer(&buffer.buffer, offset, data);
            return Ok(());
        }

        // unaligned: patch the covering aligned words and write those back
        let start = align_down(offset);
        let aligned_end = align_up(end).min(buffer.allocated);
        let mut words = self.read_aligned(&buffer.buffer, start, aligned_end)?;
        let at = (offset - start) as usize;
        words[at..at + data.len()].copy_from_slice(data);
        self.queue.write_buffer(&buffer.buffer, start, &words);
        Ok(())
    }

    fn read_buffer(&self, buffer: &WgpuBuffer, offset: u64, len: u64) -> Result<Vec<u8>, GpuError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let start = align_down(offset);
        let end = align_up(offset + len).min(buffer.allocated);
        let bytes = self.read_aligned(&buffer.buffer, start, end)?;
        let at = (offset - start) as usize;
        Ok(bytes[at..at + len as usize].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_down(7), 4);
        assert_eq!(align_down(8), 8);
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(5), 8);
        assert_eq!(align_up(8), 8);
    }

    #[test]
    fn buffer_kinds_map_to_usages() {
        let plain = buffer_usage(BufferKind::Plain);
        assert!(plain.contains(wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::STORAGE));
        let sparse = buffer_usage(BufferKind::Sparse);
        assert!(!sparse.contains(wgpu::BufferUsages::VERTEX));
        let uniform = buffer_usage(BufferKind::Uniform);
        assert!(uniform.contains(wgpu::BufferUsages::UNIFORM));
        assert!(!uniform.contains(wgpu::BufferUsages::STORAGE));
    }

    #[test]
    fn formats_map_one_to_one() {
        assert_eq!(
            texture_format(PixelFormat::Rgba8Unorm),
            wgpu::TextureFormat::Rgba8Unorm
        );
        assert_eq!(
            texture_format(PixelFormat::Depth32Float),
            wgpu::TextureFormat::Depth32Float
        );
    }
}
