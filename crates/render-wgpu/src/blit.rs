use bytemuck::{Pod, Zeroable};
use lodview_render::{
    AttachmentSlot, BlitRegion, FilterMode, Framebuffer, GpuError, Incompleteness, ResourceId,
};

use crate::device::{WgpuDevice, filter_mode};
use crate::shaders;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BlitParams {
    uv_offset: [f32; 2],
    uv_scale: [f32; 2],
}

/// Copies a framebuffer's first color attachment onto a surface view.
///
/// The bind group refers to one texture allocation. It is rebuilt whenever the
/// source attachment's [`ResourceId`] or the filter changes.
pub struct Blitter {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    linear: wgpu::Sampler,
    nearest: wgpu::Sampler,
    params: wgpu::Buffer,
    cached: Option<(ResourceId, FilterMode, wgpu::BindGroup)>,
}

impl Blitter {
    pub fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blit_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::BLIT_SHADER.into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blit_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_blit"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_blit"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let sampler = |filter: FilterMode, label: &str| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                mag_filter: filter_mode(filter),
                min_filter: filter_mode(filter),
                ..Default::default()
            })
        };

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("blit_params"),
            size: std::mem::size_of::<BlitParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            layout,
            linear: sampler(FilterMode::Linear, "blit_linear"),
            nearest: sampler(FilterMode::Nearest, "blit_nearest"),
            params,
            cached: None,
        }
    }

    /// Record the copy of `region` from `source` onto `target`.
    pub fn blit(
        &mut self,
        device: &WgpuDevice,
        encoder: &mut wgpu::CommandEncoder,
        source: &Framebuffer<WgpuDevice>,
        target: &wgpu::TextureView,
        target_extent: lodview_common::Extent2,
        region: BlitRegion,
    ) -> Result<(), GpuError> {
        let color = source.color(0);
        let (Some(id), Some(texture)) = (color.and_then(|t| t.id()), color.and_then(|t| t.raw()))
        else {
            return Err(GpuError::Incomplete {
                framebuffer: source.id(),
                slot: AttachmentSlot::Color(0),
                reason: Incompleteness::Unallocated,
            });
        };
        let src_extent = source.extent();
        if !region.src.fits(src_extent) || !region.dst.fits(target_extent) {
            return Err(GpuError::Surface(format!(
                "blit {region:?} outside source {src_extent} or surface {target_extent}"
            )));
        }

        let stale = !matches!(&self.cached, Some((cached, filter, _)) if *cached == id && *filter == region.filter);
        if stale {
            let sampler = match region.filter {
                FilterMode::Linear => &self.linear,
                FilterMode::Nearest => &self.nearest,
            };
            let bind_group = device.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("blit_bind_group"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.params.as_entire_binding(),
                    },
                ],
            });
            tracing::debug!(source = %id, "blit bind group rebuilt");
            self.cached = Some((id, region.filter, bind_group));
        }

        let (w, h) = (src_extent.width as f32, src_extent.height as f32);
        let params = BlitParams {
            uv_offset: [region.src.x as f32 / w, region.src.y as f32 / h],
            uv_scale: [
                region.src.extent.width as f32 / w,
                region.src.extent.height as f32 / h,
            ],
        };
        device
            .queue
            .write_buffer(&self.params, 0, bytemuck::bytes_of(&params));

        let Some((_, _, bind_group)) = &self.cached else {
            return Ok(());
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("blit_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        let dst = region.dst;
        pass.set_viewport(
            dst.x as f32,
            dst.y as f32,
            dst.extent.width as f32,
            dst.extent.height as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}
