use anyhow::{Context, Result, bail};
use lodview_common::Extent2;
use lodview_render::{DiagnosticFilter, GpuError, Severity};

use crate::config::ViewerConfig;
use crate::device::WgpuDevice;

/// Surface, adapter and device for one window.
pub struct GpuContext {
    pub device: WgpuDevice,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    adapter_info: wgpu::AdapterInfo,
}

fn classify(err: &wgpu::Error) -> Severity {
    if matches!(err, wgpu::Error::Internal { .. }) {
        Severity::Medium
    } else {
        Severity::High
    }
}

/// Prefer a linear format: the offscreen target is `Rgba8Unorm` and the blit
/// copies values through unchanged.
fn preferred_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .find(|f| !f.is_srgb())
        .or_else(|| formats.first())
        .copied()
}

impl GpuContext {
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        size: Extent2,
        viewer: &ViewerConfig,
        diagnostics: DiagnosticFilter,
    ) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(target)
            .context("creating window surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: viewer.power_preference.into(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no GPU adapter compatible with the window surface")?;
        let adapter_info = adapter.get_info();

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lodview_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("creating GPU device")?;

        device.on_uncaptured_error(Box::new(move |err| {
            diagnostics.report(classify(&err), "wgpu", &err.to_string());
        }));

        let caps = surface.get_capabilities(&adapter);
        let Some(format) = preferred_surface_format(&caps.formats) else {
            bail!("surface is not supported by adapter {}", adapter_info.name);
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: viewer.present_mode(),
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        tracing::info!(
            adapter = %adapter_info.name,
            backend = adapter_info.backend.to_str(),
            ?format,
            "GPU initialized"
        );

        Ok(Self {
            device: WgpuDevice::new(device, queue),
            surface,
            config,
            adapter_info,
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn configured_extent(&self) -> Extent2 {
        Extent2::new(self.config.width, self.config.height)
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Reconfigure the swapchain. Empty sizes are ignored.
    pub fn resize(&mut self, size: Extent2) {
        if size.is_empty() || size == self.configured_extent() {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device.device, &self.config);
        tracing::debug!(%size, "surface reconfigured");
    }

    /// Next swapchain image, or `None` when the frame should be skipped.
    pub fn acquire(&mut self) -> Result<Option<wgpu::SurfaceTexture>, GpuError> {
        match self.surface.get_current_texture() {
            Ok(texture) => Ok(Some(texture)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device.device, &self.config);
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                Err(GpuError::Surface("out of memory acquiring surface".into()))
            }
            Err(err) => {
                tracing::warn!("surface unavailable: {err}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_formats_win() {
        let formats = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
        ];
        assert_eq!(
            preferred_surface_format(&formats),
            Some(wgpu::TextureFormat::Bgra8Unorm)
        );
        assert_eq!(
            preferred_surface_format(&[wgpu::TextureFormat::Rgba8UnormSrgb]),
            Some(wgpu::TextureFormat::Rgba8UnormSrgb)
        );
        assert_eq!(preferred_surface_format(&[]), None);
    }
}
