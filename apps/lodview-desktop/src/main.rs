mod input_map;

use anyhow::{Context, Result};
use clap::Parser;
use glam::DVec3;
use lodview_common::Extent2;
use lodview_input::{InputEvent, Modifiers};
use lodview_render::{DiagnosticFilter, FixedControls, FrameBackend, FrameDriver, FrameOutcome};
use lodview_render_wgpu::{GpuContext, GridScene, ViewerConfig, WgpuBackend, WgpuDevice};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "lodview", about = "Interactive viewer driven by the lodview frame loop")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON viewer configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    title: Option<String>,

    /// Present without waiting for vertical sync
    #[arg(long)]
    no_vsync: bool,
}

impl Cli {
    fn viewer_config(&self) -> Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };
        if let Some(width) = self.width {
            config.size.width = width;
        }
        if let Some(height) = self.height {
            config.size.height = height;
        }
        if let Some(title) = &self.title {
            config.title = title.clone();
        }
        if self.no_vsync {
            config.vsync = false;
        }
        Ok(config)
    }
}

/// Everything that lives as long as the window.
struct Viewer {
    window: Arc<Window>,
    backend: WgpuBackend,
    driver: FrameDriver<WgpuDevice>,
    scene: GridScene,
    egui_winit: egui_winit::State,
    modifiers: Modifiers,
    pending_drop: Vec<PathBuf>,
}

impl Viewer {
    fn new(window: Arc<Window>, config: &ViewerConfig) -> Result<Self> {
        let inner = window.inner_size();
        let size = Extent2::new(inner.width, inner.height);
        let diagnostics = DiagnosticFilter::new(config.driver.diagnostic_threshold);
        let gpu = GpuContext::new(window.clone(), size, config, diagnostics)?;
        info!(
            adapter = %gpu.adapter_info().name,
            backend = ?gpu.adapter_info().backend,
            format = ?gpu.surface_format(),
            "GPU initialized"
        );
        let backend = WgpuBackend::new(gpu);

        let controls = FixedControls::look_at(DVec3::new(0.0, 10.0, 15.0), DVec3::ZERO, DVec3::Y);
        let mut driver = FrameDriver::new(backend.device(), config.driver.clone(), Box::new(controls))
            .context("creating frame driver")?;
        driver.add_drop_listener(|paths| {
            for path in paths {
                info!(path = %path.display(), "file dropped on viewer");
            }
        });

        let scene = GridScene::new(backend.device(), 50, 1.0).context("creating grid scene")?;

        let egui_winit = egui_winit::State::new(
            backend.overlay().context().clone(),
            egui::ViewportId::ROOT,
            &*window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        Ok(Self {
            window,
            backend,
            driver,
            scene,
            egui_winit,
            modifiers: Modifiers::default(),
            pending_drop: Vec::new(),
        })
    }

    fn forward(&mut self, event: &WindowEvent, overlay_consumed: bool) {
        let Some(input) = input_map::translate(event, self.modifiers) else {
            return;
        };
        let overlay_has_pointer = overlay_consumed || self.backend.overlay().wants_pointer_input();
        if input_map::is_pointer(&input) && overlay_has_pointer {
            return;
        }
        self.backend.push_event(input);
    }

    /// Merge the drops collected since the last flush into one batch.
    fn flush_drops(&mut self) {
        if self.pending_drop.is_empty() {
            return;
        }
        let paths = std::mem::take(&mut self.pending_drop);
        self.backend.push_event(InputEvent::Drop { paths });
    }

    fn redraw(&mut self) -> Result<FrameOutcome> {
        let raw_input = self.egui_winit.take_egui_input(&self.window);
        self.backend.overlay_mut().set_input(raw_input);

        let outcome = self.driver.run_frame(&mut self.backend, &mut self.scene);

        if let Some(output) = self.backend.overlay_mut().take_platform_output() {
            self.egui_winit.handle_platform_output(&self.window, output);
        }
        Ok(outcome?)
    }
}

struct App {
    config: ViewerConfig,
    viewer: Option<Viewer>,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            viewer: None,
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.fatal = Some(err);
        self.viewer = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.size.width,
                self.config.size.height,
            ));

        let viewer = event_loop
            .create_window(attrs)
            .context("creating window")
            .and_then(|window| Viewer::new(Arc::new(window), &self.config));

        match viewer {
            Ok(viewer) => self.viewer = Some(viewer),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };

        let response = viewer.egui_winit.on_window_event(&viewer.window, &event);

        match &event {
            WindowEvent::CloseRequested => {
                viewer.driver.request_close();
                viewer.window.request_redraw();
            }
            WindowEvent::Resized(size) => {
                viewer
                    .backend
                    .set_window_size(Extent2::new(size.width, size.height));
            }
            WindowEvent::ModifiersChanged(m) => {
                viewer.modifiers = input_map::map_modifiers(m.state());
            }
            WindowEvent::DroppedFile(path) => {
                viewer.pending_drop.push(path.clone());
            }
            WindowEvent::RedrawRequested => {
                viewer.flush_drops();
                match viewer.redraw() {
                    Ok(FrameOutcome::Exit) => {
                        self.viewer = None;
                        event_loop.exit();
                    }
                    Ok(_) => {}
                    Err(err) => self.fail(event_loop, err),
                }
            }
            _ => viewer.forward(&event, response.consumed),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = self.viewer.as_mut() {
            viewer.flush_drops();
            viewer.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    info!("lodview-desktop starting");
    info!("{}", lodview_render::crate_info());
    info!("{}", lodview_render_wgpu::crate_info());

    let config = cli.viewer_config()?;

    let event_loop = EventLoop::new().context("creating event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("running event loop")?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => {
            info!("lodview-desktop exited cleanly");
            Ok(())
        }
    }
}
