use lodview_common::{Extent2, TaskQueue, TaskSender};
use glam::DVec2;
use lodview_input::{
    DropListenerId, DropListeners, EventHandler, InputEvent, Key, KeyAction, Modifiers, MouseButton,
    SessionState,
};
use std::path::PathBuf;
use std::time::Instant;

use crate::camera::Camera;
use crate::config::DriverConfig;
use crate::controls::Controls;
use crate::diagnostics::{DiagnosticFilter, Severity};
use crate::framebuffer::{BlitRegion, Framebuffer, Viewport};
use crate::plot::{PerfPanel, PerfPlot};
use crate::resource::{GpuDevice, GpuError};
use crate::timing::{FrameTimer, FrameTiming};

/// Label of the always-visible overlay control that flips `show_gui`.
pub const TOGGLE_GUI_LABEL: &str = "Toggle GUI";

/// State owned by the frame loop and lent to scene callbacks and queued tasks.
#[derive(Debug, Clone, Default)]
pub struct FrameState {
    pub camera: Camera,
    pub session: SessionState,
    /// Window size seen at the start of the current frame.
    pub size: Extent2,
}

/// Presentation side of the frame loop: surface, overlay and event source.
///
/// The driver calls these in a fixed order every frame. A backend never
/// reorders or batches the calls.
pub trait FrameBackend {
    type Device: GpuDevice;
    /// Per-frame recording state, alive from acquire to present.
    type Frame;

    fn device(&self) -> &Self::Device;

    fn window_size(&self) -> Extent2;

    /// Acquire the next surface image. `Ok(None)` means the surface is
    /// temporarily unavailable and the frame should be skipped.
    fn acquire_frame(&mut self, size: Extent2) -> Result<Option<Self::Frame>, GpuError>;

    fn bind_default_surface(&mut self, frame: &mut Self::Frame, viewport: Viewport);

    fn bind_framebuffer(
        &mut self,
        frame: &mut Self::Frame,
        target: &Framebuffer<Self::Device>,
        viewport: Viewport,
    ) -> Result<(), GpuError>;

    fn begin_overlay(&mut self, frame: &mut Self::Frame);

    /// Draw a button; returns true when it was clicked this frame.
    fn overlay_toggle(&mut self, label: &str) -> bool;

    fn overlay_perf_panel(&mut self, panel: &PerfPanel<'_>);

    /// Finish the overlay and composite it into `target`.
    fn end_overlay(
        &mut self,
        frame: &mut Self::Frame,
        target: &Framebuffer<Self::Device>,
    ) -> Result<(), GpuError>;

    /// Copy `source`'s first color attachment onto the default surface.
    fn blit_to_surface(
        &mut self,
        frame: &mut Self::Frame,
        source: &Framebuffer<Self::Device>,
        region: BlitRegion,
    ) -> Result<(), GpuError>;

    fn present(&mut self, frame: Self::Frame);

    /// Events that arrived since the last poll, drop batches already merged.
    fn poll_events(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }
}

pub struct UpdateContext<'a, D> {
    pub device: &'a D,
    pub state: &'a mut FrameState,
    pub timing: FrameTiming,
}

pub struct RenderContext<'a, B: FrameBackend> {
    pub device: &'a B::Device,
    pub frame: &'a mut B::Frame,
    /// Primary render target, already bound.
    pub target: &'a Framebuffer<B::Device>,
    pub state: &'a FrameState,
    pub viewport: Viewport,
}

/// Caller-supplied per-frame callbacks.
pub trait Scene<B: FrameBackend> {
    fn update(&mut self, _ctx: UpdateContext<'_, B::Device>) -> Result<(), GpuError> {
        Ok(())
    }

    /// Draw into `ctx.target`.
    fn render(&mut self, _ctx: RenderContext<'_, B>) -> Result<(), GpuError> {
        Ok(())
    }
}

impl<B: FrameBackend> Scene<B> for () {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame presented, keep running.
    Continue,
    /// Nothing was drawn this iteration.
    Skipped,
    /// Close was requested; the caller should release the window.
    Exit,
}

/// Owns the camera, the primary framebuffer and the fixed per-frame sequence.
pub struct FrameDriver<D: GpuDevice> {
    config: DriverConfig,
    state: FrameState,
    view: Framebuffer<D>,
    controls: Box<dyn Controls>,
    timer: FrameTimer,
    perf: PerfPlot,
    tasks: TaskQueue<FrameState>,
    drop_listeners: DropListeners,
    diagnostics: DiagnosticFilter,
}

impl<D: GpuDevice> FrameDriver<D> {
    pub fn new(
        device: &D,
        config: DriverConfig,
        controls: Box<dyn Controls>,
    ) -> Result<Self, GpuError> {
        Self::new_at(device, config, controls, Instant::now())
    }

    /// Like [`FrameDriver::new`] with an explicit start time.
    pub fn new_at(
        device: &D,
        config: DriverConfig,
        controls: Box<dyn Controls>,
        start: Instant,
    ) -> Result<Self, GpuError> {
        let view = Framebuffer::new(device, config.initial_view_extent)?;
        let timer = FrameTimer::new(start, config.history_len, config.fps_window());
        let perf = PerfPlot::new(
            config.plot_capacity,
            config.plot_history_secs,
            config.plot_y_max_ms,
        );
        let diagnostics = DiagnosticFilter::new(config.diagnostic_threshold);

        tracing::info!(
            view = %config.initial_view_extent,
            history = config.history_len,
            "frame driver created"
        );

        Ok(Self {
            config,
            state: FrameState::default(),
            view,
            controls,
            timer,
            perf,
            tasks: TaskQueue::new(),
            drop_listeners: DropListeners::new(),
            diagnostics,
        })
    }

    /// Run one frame now.
    pub fn run_frame<B, S>(&mut self, backend: &mut B, scene: &mut S) -> Result<FrameOutcome, GpuError>
    where
        B: FrameBackend<Device = D>,
        S: Scene<B>,
    {
        self.run_frame_at(Instant::now(), backend, scene)
    }

    /// Run one frame as if it started at `now`.
    ///
    /// Errors are fatal: they are reported through the diagnostic filter and
    /// returned for the caller to shut down on.
    pub fn run_frame_at<B, S>(
        &mut self,
        now: Instant,
        backend: &mut B,
        scene: &mut S,
    ) -> Result<FrameOutcome, GpuError>
    where
        B: FrameBackend<Device = D>,
        S: Scene<B>,
    {
        let _span = tracing::debug_span!("frame", index = self.timer.frame_count()).entered();
        self.frame(now, backend, scene).inspect_err(|err| {
            self.diagnostics
                .report(Severity::High, "frame", &err.to_string());
        })
    }

    fn frame<B, S>(&mut self, now: Instant, backend: &mut B, scene: &mut S) -> Result<FrameOutcome, GpuError>
    where
        B: FrameBackend<Device = D>,
        S: Scene<B>,
    {
        let timing = self.timer.tick(now);
        let elapsed = timing.elapsed.as_secs_f32();
        self.perf
            .add_sample(elapsed, timing.since_last.as_secs_f32() * 1000.0);

        let size = backend.window_size();
        self.state.size = size;
        if size.is_empty() {
            self.tasks.process_pending(&mut self.state);
            self.poll_events(backend);
            return Ok(self.skipped());
        }
        self.state.camera.set_extent(size);

        self.tasks.process_pending(&mut self.state);

        let Some(mut frame) = backend.acquire_frame(size)? else {
            tracing::debug!(%size, "surface unavailable, skipping frame");
            self.poll_events(backend);
            return Ok(self.skipped());
        };
        let viewport = Viewport::full(size);
        backend.bind_default_surface(&mut frame, viewport);
        self.view.reallocate_if_size_changed(backend.device(), size)?;
        backend.bind_framebuffer(&mut frame, &self.view, viewport)?;

        self.controls.update();
        self.state.camera.set_world(self.controls.world());

        backend.begin_overlay(&mut frame);

        self.state.camera.update();
        scene.update(UpdateContext {
            device: backend.device(),
            state: &mut self.state,
            timing,
        })?;

        self.state.camera.update();
        scene.render(RenderContext {
            device: backend.device(),
            frame: &mut frame,
            target: &self.view,
            state: &self.state,
            viewport,
        })?;

        if backend.overlay_toggle(TOGGLE_GUI_LABEL) {
            self.state.session.toggle_gui();
        }

        if self.state.session.show_gui && self.state.session.show_perf_graph {
            backend.overlay_perf_panel(&PerfPanel {
                fps: self.timer.fps(),
                plot: &self.perf,
                now: elapsed,
            });
        }

        backend.end_overlay(&mut frame, &self.view)?;

        backend.blit_to_surface(&mut frame, &self.view, self.view.full_region())?;

        backend.bind_default_surface(&mut frame, viewport);
        backend.present(frame);
        self.poll_events(backend);

        self.timer.finish_frame();
        if self.state.session.close_requested() {
            tracing::info!(frames = self.timer.frame_count(), "frame loop shutting down");
            return Ok(FrameOutcome::Exit);
        }
        Ok(FrameOutcome::Continue)
    }

    /// Run frames until close is requested.
    pub fn run<B, S>(&mut self, backend: &mut B, scene: &mut S) -> Result<(), GpuError>
    where
        B: FrameBackend<Device = D>,
        S: Scene<B>,
    {
        while self.run_frame(backend, scene)? != FrameOutcome::Exit {}
        Ok(())
    }

    fn skipped(&self) -> FrameOutcome {
        if self.state.session.close_requested() {
            FrameOutcome::Exit
        } else {
            FrameOutcome::Skipped
        }
    }

    fn poll_events<B: FrameBackend<Device = D>>(&mut self, backend: &mut B) {
        for event in backend.poll_events() {
            self.dispatch(event);
        }
    }

    /// Handle for queueing work from other threads.
    pub fn task_sender(&self) -> TaskSender<FrameState> {
        self.tasks.sender()
    }

    pub fn add_drop_listener<F>(&mut self, listener: F) -> DropListenerId
    where
        F: FnMut(&[PathBuf]) + 'static,
    {
        self.drop_listeners.add(listener)
    }

    pub fn remove_drop_listener(&mut self, id: DropListenerId) -> bool {
        self.drop_listeners.remove(id)
    }

    pub fn request_close(&mut self) {
        self.state.session.request_close();
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut FrameState {
        &mut self.state
    }

    pub fn view(&self) -> &Framebuffer<D> {
        &self.view
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    pub fn perf(&self) -> &PerfPlot {
        &self.perf
    }

    pub fn diagnostics(&self) -> DiagnosticFilter {
        self.diagnostics
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }
}

impl<D: GpuDevice> FrameDriver<D> {
    /// Fold an event into the session and hand it to the controls.
    fn route(&mut self, event: &InputEvent) {
        self.state.session.apply(event);
        self.controls.handle_event(event);
    }
}

impl<D: GpuDevice> EventHandler for FrameDriver<D> {
    fn on_key(&mut self, key: Key, action: KeyAction, modifiers: Modifiers) {
        self.route(&InputEvent::Key {
            key,
            action,
            modifiers,
        });
    }

    fn on_mouse_move(&mut self, position: DVec2) {
        self.route(&InputEvent::MouseMove { position });
    }

    fn on_mouse_button(&mut self, button: MouseButton, action: KeyAction, modifiers: Modifiers) {
        self.route(&InputEvent::MouseButton {
            button,
            action,
            modifiers,
        });
    }

    fn on_scroll(&mut self, delta: DVec2) {
        self.route(&InputEvent::Scroll { delta });
    }

    fn on_drop(&mut self, paths: &[PathBuf]) {
        for path in paths {
            tracing::info!(path = %path.display(), "file dropped");
        }
        self.route(&InputEvent::Drop {
            paths: paths.to_vec(),
        });
        self.drop_listeners.dispatch(paths);
    }
}
