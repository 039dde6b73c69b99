use lodview_common::Extent2;
use lodview_input::InputEvent;
use lodview_render::{
    BlitRegion, FrameBackend, Framebuffer, GpuError, PerfPanel, PixelFormat, Viewport,
};

use crate::blit::Blitter;
use crate::device::{WgpuDevice, texture_format};
use crate::gpu::GpuContext;
use crate::overlay::EguiOverlay;

/// Recording state of one presented frame.
pub struct WgpuFrame {
    surface: wgpu::SurfaceTexture,
    pub surface_view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
    pub extent: Extent2,
    /// Viewport of the most recent bind.
    pub viewport: Viewport,
    extra: Vec<wgpu::CommandBuffer>,
}

/// [`FrameBackend`] presenting through a wgpu surface with an egui overlay.
///
/// Window-toolkit events are pushed in by the adapter and handed to the
/// driver at the poll step.
pub struct WgpuBackend {
    gpu: GpuContext,
    blitter: Blitter,
    overlay: EguiOverlay,
    window_size: Extent2,
    pending: Vec<InputEvent>,
}

impl WgpuBackend {
    pub fn new(gpu: GpuContext) -> Self {
        let blitter = Blitter::new(&gpu.device.device, gpu.surface_format());
        let overlay = EguiOverlay::new(
            &gpu.device.device,
            texture_format(PixelFormat::Rgba8Unorm),
        );
        let window_size = gpu.configured_extent();
        Self {
            gpu,
            blitter,
            overlay,
            window_size,
            pending: Vec::new(),
        }
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn overlay(&self) -> &EguiOverlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut EguiOverlay {
        &mut self.overlay
    }

    pub fn set_window_size(&mut self, size: Extent2) {
        self.window_size = size;
    }

    pub fn push_event(&mut self, event: InputEvent) {
        self.pending.push(event);
    }
}

impl FrameBackend for WgpuBackend {
    type Device = WgpuDevice;
    type Frame = WgpuFrame;

    fn device(&self) -> &WgpuDevice {
        &self.gpu.device
    }

    fn window_size(&self) -> Extent2 {
        self.window_size
    }

    fn acquire_frame(&mut self, size: Extent2) -> Result<Option<WgpuFrame>, GpuError> {
        self.gpu.resize(size);
        let Some(surface) = self.gpu.acquire()? else {
            return Ok(None);
        };
        let surface_view = surface
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .gpu
            .device
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        let extent = Extent2::new(surface.texture.width(), surface.texture.height());
        Ok(Some(WgpuFrame {
            surface,
            surface_view,
            encoder,
            extent,
            viewport: Viewport::full(extent),
            extra: Vec::new(),
        }))
    }

    fn bind_default_surface(&mut self, frame: &mut WgpuFrame, viewport: Viewport) {
        frame.viewport = viewport;
    }

    fn bind_framebuffer(
        &mut self,
        frame: &mut WgpuFrame,
        target: &Framebuffer<WgpuDevice>,
        viewport: Viewport,
    ) -> Result<(), GpuError> {
        target.check_complete()?;
        frame.viewport = viewport;
        Ok(())
    }

    fn begin_overlay(&mut self, _frame: &mut WgpuFrame) {
        self.overlay.begin();
    }

    fn overlay_toggle(&mut self, label: &str) -> bool {
        self.overlay.toggle_button(label)
    }

    fn overlay_perf_panel(&mut self, panel: &PerfPanel<'_>) {
        self.overlay.perf_panel(panel);
    }

    fn end_overlay(
        &mut self,
        frame: &mut WgpuFrame,
        target: &Framebuffer<WgpuDevice>,
    ) -> Result<(), GpuError> {
        let commands = self
            .overlay
            .end(&self.gpu.device, &mut frame.encoder, target)?;
        frame.extra.extend(commands);
        Ok(())
    }

    fn blit_to_surface(
        &mut self,
        frame: &mut WgpuFrame,
        source: &Framebuffer<WgpuDevice>,
        region: BlitRegion,
    ) -> Result<(), GpuError> {
        self.blitter.blit(
            &self.gpu.device,
            &mut frame.encoder,
            source,
            &frame.surface_view,
            frame.extent,
            region,
        )
    }

    fn present(&mut self, frame: WgpuFrame) {
        let WgpuFrame {
            surface,
            encoder,
            extra,
            ..
        } = frame;
        self.gpu
            .device
            .queue
            .submit(extra.into_iter().chain(std::iter::once(encoder.finish())));
        surface.present();
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.pending)
    }
}
