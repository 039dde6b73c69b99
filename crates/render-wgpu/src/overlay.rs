use egui::{Color32, Pos2, Rect, Stroke, Vec2};
use lodview_render::{Framebuffer, GpuError, PerfPanel, PerfPlot, ScrollingBuffer};

use crate::device::WgpuDevice;

const PLOT_SIZE: Vec2 = Vec2::new(320.0, 140.0);
const FRAME_COLOR: Color32 = Color32::from_rgb(90, 200, 250);
const FPS60_COLOR: Color32 = Color32::from_rgb(120, 220, 120);
const FPS120_COLOR: Color32 = Color32::from_rgb(230, 180, 80);

/// Immediate-mode diagnostic overlay drawn with egui into the primary
/// framebuffer.
///
/// The window adapter feeds raw input through [`EguiOverlay::set_input`]
/// before each frame and applies [`EguiOverlay::take_platform_output`]
/// afterwards.
pub struct EguiOverlay {
    ctx: egui::Context,
    renderer: egui_wgpu::Renderer,
    input: egui::RawInput,
    platform_output: Option<egui::PlatformOutput>,
    running: bool,
}

impl EguiOverlay {
    pub fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        Self {
            ctx: egui::Context::default(),
            renderer: egui_wgpu::Renderer::new(device, target_format, None, 1, false),
            input: egui::RawInput::default(),
            platform_output: None,
            running: false,
        }
    }

    pub fn context(&self) -> &egui::Context {
        &self.ctx
    }

    /// Input for the next overlay pass.
    pub fn set_input(&mut self, input: egui::RawInput) {
        self.input = input;
    }

    pub fn take_platform_output(&mut self) -> Option<egui::PlatformOutput> {
        self.platform_output.take()
    }

    /// Whether the pointer is over an overlay widget.
    pub fn wants_pointer_input(&self) -> bool {
        self.ctx.wants_pointer_input()
    }

    pub fn begin(&mut self) {
        let input = std::mem::take(&mut self.input);
        self.ctx.begin_pass(input);
        self.running = true;
    }

    pub fn toggle_button(&mut self, label: &str) -> bool {
        if !self.running {
            return false;
        }
        egui::Area::new(egui::Id::new("overlay_toggle"))
            .fixed_pos(Pos2::new(8.0, 8.0))
            .show(&self.ctx, |ui| ui.button(label).clicked())
            .inner
    }

    pub fn perf_panel(&mut self, panel: &PerfPanel<'_>) {
        if !self.running {
            return;
        }
        egui::Window::new("Performance")
            .default_pos(Pos2::new(8.0, 40.0))
            .resizable(false)
            .show(&self.ctx, |ui| {
                ui.label(format!("FPS: {:.1}", panel.fps));
                draw_plot(ui, panel.plot, panel.now);
            });
    }

    /// Tessellate the pass and render it into `target`'s first color
    /// attachment.
    pub fn end(
        &mut self,
        device: &WgpuDevice,
        encoder: &mut wgpu::CommandEncoder,
        target: &Framebuffer<WgpuDevice>,
    ) -> Result<Vec<wgpu::CommandBuffer>, GpuError> {
        if !self.running {
            return Ok(Vec::new());
        }
        self.running = false;
        let output = self.ctx.end_pass();
        self.platform_output = Some(output.platform_output);

        let Some(view) = target.color(0).and_then(|t| t.raw()).map(|t| &t.view) else {
            return Err(GpuError::Surface("overlay target has no color attachment".into()));
        };

        let paint_jobs = self.ctx.tessellate(output.shapes, output.pixels_per_point);
        let extent = target.extent();
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [extent.width, extent.height],
            pixels_per_point: output.pixels_per_point,
        };

        for (id, delta) in &output.textures_delta.set {
            self.renderer
                .update_texture(&device.device, &device.queue, *id, delta);
        }
        let user_commands = self.renderer.update_buffers(
            &device.device,
            &device.queue,
            encoder,
            &paint_jobs,
            &screen,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("overlay_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            self.renderer.render(&mut pass, &paint_jobs, &screen);
        }
        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
        Ok(user_commands)
    }
}

/// Scrolling frame-time plot with the 60 and 120 FPS reference lines.
fn draw_plot(ui: &mut egui::Ui, plot: &PerfPlot, now: f32) {
    let (response, painter) = ui.allocate_painter(PLOT_SIZE, egui::Sense::hover());
    let rect = response.rect;
    painter.rect_filled(rect, 2.0, Color32::from_black_alpha(160));

    let (x_min, x_max) = plot.x_range(now);
    let (y_min, y_max) = plot.y_range();
    let to_screen = |[t, v]: [f32; 2]| {
        let x = (t - x_min) / (x_max - x_min);
        let y = ((v - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
        Pos2::new(rect.left() + x * rect.width(), rect.bottom() - y * rect.height())
    };

    let line = |buffer: &ScrollingBuffer, color: Color32| {
        let points: Vec<Pos2> = buffer
            .iter_ordered()
            .filter(|[t, _]| *t >= x_min)
            .map(to_screen)
            .collect();
        if points.len() >= 2 {
            painter.add(egui::Shape::line(points, Stroke::new(1.5, color)));
        }
    };
    line(&plot.fps120, FPS120_COLOR);
    line(&plot.fps60, FPS60_COLOR);
    line(&plot.frames, FRAME_COLOR);

    painter.text(
        rect.left_top() + Vec2::new(4.0, 2.0),
        egui::Align2::LEFT_TOP,
        format!("{y_max:.0} ms"),
        egui::FontId::monospace(10.0),
        Color32::GRAY,
    );
    painter.text(
        clamp_into(rect, to_screen([x_min, PerfPlot::FPS60_MS])) + Vec2::new(4.0, -2.0),
        egui::Align2::LEFT_BOTTOM,
        "60 fps",
        egui::FontId::monospace(10.0),
        FPS60_COLOR,
    );
}

fn clamp_into(rect: Rect, p: Pos2) -> Pos2 {
    Pos2::new(
        p.x.clamp(rect.left(), rect.right()),
        p.y.clamp(rect.top(), rect.bottom()),
    )
}
