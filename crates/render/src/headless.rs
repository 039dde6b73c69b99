//! In-memory device and frame backend.
//!
//! Nothing here touches a GPU. The device counts allocations and keeps buffer
//! contents in host memory; the backend records every call the frame driver
//! makes so the sequence can be inspected.

use lodview_common::Extent2;
use lodview_input::InputEvent;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::driver::FrameBackend;
use crate::framebuffer::{BlitRegion, Framebuffer, Viewport};
use crate::plot::PerfPanel;
use crate::resource::{
    BufferDesc, BufferKind, GpuDevice, GpuError, PixelFormat, ResourceId, TextureDesc,
    TextureParams,
};

const PAGE_SIZE: u64 = 4096;

#[derive(Debug, Default)]
struct Counters {
    textures_created: Cell<usize>,
    textures_live: Cell<usize>,
    buffers_created: Cell<usize>,
    fail_next_texture: Cell<bool>,
}

/// Host-memory [`GpuDevice`]. Clones share counters.
#[derive(Debug, Clone, Default)]
pub struct HeadlessDevice {
    counters: Rc<Counters>,
}

/// Texture handle of the headless device.
#[derive(Debug)]
pub struct HeadlessTexture {
    pub extent: Extent2,
    pub format: PixelFormat,
    pub params: TextureParams,
    counters: Rc<Counters>,
}

impl Drop for HeadlessTexture {
    fn drop(&mut self) {
        let live = &self.counters.textures_live;
        live.set(live.get().saturating_sub(1));
    }
}

/// Buffer handle of the headless device.
///
/// Storage is paged and grows on first write, so unwritten ranges read as
/// zeros and large sparse buffers cost nothing until touched.
#[derive(Debug)]
pub struct HeadlessBuffer {
    pub size: u64,
    pub kind: BufferKind,
    pages: RefCell<HashMap<u64, Box<[u8]>>>,
}

impl HeadlessBuffer {
    /// Pages with at least one written byte.
    pub fn resident_pages(&self) -> usize {
        self.pages.borrow().len()
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn textures_created(&self) -> usize {
        self.counters.textures_created.get()
    }

    pub fn textures_live(&self) -> usize {
        self.counters.textures_live.get()
    }

    pub fn buffers_created(&self) -> usize {
        self.counters.buffers_created.get()
    }

    /// Make the next texture allocation fail.
    pub fn fail_next_texture(&self) {
        self.counters.fail_next_texture.set(true);
    }
}

impl GpuDevice for HeadlessDevice {
    type Texture = HeadlessTexture;
    type Buffer = HeadlessBuffer;

    fn create_texture(&self, desc: &TextureDesc<'_>) -> Result<HeadlessTexture, GpuError> {
        if self.counters.fail_next_texture.replace(false) {
            return Err(GpuError::Allocation {
                label: desc.label.to_string(),
                reason: "injected failure".into(),
            });
        }
        let c = &self.counters;
        c.textures_created.set(c.textures_created.get() + 1);
        c.textures_live.set(c.textures_live.get() + 1);
        Ok(HeadlessTexture {
            extent: desc.extent,
            format: desc.format,
            params: desc.params,
            counters: self.counters.clone(),
        })
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<HeadlessBuffer, GpuError> {
        let c = &self.counters;
        c.buffers_created.set(c.buffers_created.get() + 1);
        Ok(HeadlessBuffer {
            size: desc.size,
            kind: desc.kind,
            pages: RefCell::new(HashMap::new()),
        })
    }

    fn write_buffer(&self, buffer: &HeadlessBuffer, offset: u64, data: &[u8]) -> Result<(), GpuError> {
        let mut pages = buffer.pages.borrow_mut();
        for (i, byte) in data.iter().enumerate() {
            let addr = offset + i as u64;
            let page = pages
                .entry(addr / PAGE_SIZE)
                .or_insert_with(|| vec![0; PAGE_SIZE as usize].into_boxed_slice());
            page[(addr % PAGE_SIZE) as usize] = *byte;
        }
        Ok(())
    }

    fn read_buffer(&self, buffer: &HeadlessBuffer, offset: u64, len: u64) -> Result<Vec<u8>, GpuError> {
        let pages = buffer.pages.borrow();
        let out = (offset..offset + len)
            .map(|addr| {
                pages
                    .get(&(addr / PAGE_SIZE))
                    .map_or(0, |page| page[(addr % PAGE_SIZE) as usize])
            })
            .collect();
        Ok(out)
    }
}

/// One call the driver made on the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStep {
    Acquire(Extent2),
    BindSurface(Viewport),
    BindFramebuffer {
        framebuffer: ResourceId,
        color: Option<ResourceId>,
        viewport: Viewport,
    },
    BeginOverlay,
    Toggle { clicked: bool },
    PerfPanel { fps: f64, samples: usize },
    EndOverlay,
    Blit(BlitRegion),
    /// Draw calls the scene recorded into the frame.
    Present { draws: Vec<String> },
}

/// Recording state of one headless frame.
#[derive(Debug)]
pub struct HeadlessFrame {
    pub extent: Extent2,
    pub draws: Vec<String>,
}

impl HeadlessFrame {
    pub fn draw(&mut self, command: impl Into<String>) {
        self.draws.push(command.into());
    }
}

/// [`FrameBackend`] that records the call sequence instead of presenting.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    device: HeadlessDevice,
    size: Extent2,
    pending: Vec<InputEvent>,
    steps: Vec<FrameStep>,
    click_toggle: bool,
    unavailable_frames: usize,
    presented: u64,
}

impl HeadlessBackend {
    pub fn new(size: Extent2) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Shares counters with `device`.
    pub fn with_device(device: HeadlessDevice, size: Extent2) -> Self {
        Self {
            device,
            size,
            ..Self::default()
        }
    }

    pub fn set_window_size(&mut self, size: Extent2) {
        self.size = size;
    }

    /// Queue an event to be delivered at the next poll.
    pub fn push_event(&mut self, event: InputEvent) {
        self.pending.push(event);
    }

    /// Report a click on the overlay toggle in the next frame.
    pub fn click_toggle_next_frame(&mut self) {
        self.click_toggle = true;
    }

    /// Make the next `n` acquires report a lost surface.
    pub fn make_surface_unavailable(&mut self, n: usize) {
        self.unavailable_frames = n;
    }

    pub fn steps(&self) -> &[FrameStep] {
        &self.steps
    }

    pub fn take_steps(&mut self) -> Vec<FrameStep> {
        std::mem::take(&mut self.steps)
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl FrameBackend for HeadlessBackend {
    type Device = HeadlessDevice;
    type Frame = HeadlessFrame;

    fn device(&self) -> &HeadlessDevice {
        &self.device
    }

    fn window_size(&self) -> Extent2 {
        self.size
    }

    fn acquire_frame(&mut self, size: Extent2) -> Result<Option<HeadlessFrame>, GpuError> {
        if self.unavailable_frames > 0 {
            self.unavailable_frames -= 1;
            return Ok(None);
        }
        self.steps.push(FrameStep::Acquire(size));
        Ok(Some(HeadlessFrame {
            extent: size,
            draws: Vec::new(),
        }))
    }

    fn bind_default_surface(&mut self, _frame: &mut HeadlessFrame, viewport: Viewport) {
        self.steps.push(FrameStep::BindSurface(viewport));
    }

    fn bind_framebuffer(
        &mut self,
        _frame: &mut HeadlessFrame,
        target: &Framebuffer<HeadlessDevice>,
        viewport: Viewport,
    ) -> Result<(), GpuError> {
        target.check_complete()?;
        self.steps.push(FrameStep::BindFramebuffer {
            framebuffer: target.id(),
            color: target.color(0).and_then(|t| t.id()),
            viewport,
        });
        Ok(())
    }

    fn begin_overlay(&mut self, _frame: &mut HeadlessFrame) {
        self.steps.push(FrameStep::BeginOverlay);
    }

    fn overlay_toggle(&mut self, _label: &str) -> bool {
        let clicked = std::mem::take(&mut self.click_toggle);
        self.steps.push(FrameStep::Toggle { clicked });
        clicked
    }

    fn overlay_perf_panel(&mut self, panel: &PerfPanel<'_>) {
        self.steps.push(FrameStep::PerfPanel {
            fps: panel.fps,
            samples: panel.plot.frames.len(),
        });
    }

    fn end_overlay(
        &mut self,
        _frame: &mut HeadlessFrame,
        _target: &Framebuffer<HeadlessDevice>,
    ) -> Result<(), GpuError> {
        self.steps.push(FrameStep::EndOverlay);
        Ok(())
    }

    fn blit_to_surface(
        &mut self,
        frame: &mut HeadlessFrame,
        source: &Framebuffer<HeadlessDevice>,
        region: BlitRegion,
    ) -> Result<(), GpuError> {
        if !region.src.fits(source.extent()) || !region.dst.fits(frame.extent) {
            return Err(GpuError::Surface(format!(
                "blit {region:?} outside source {} or surface {}",
                source.extent(),
                frame.extent
            )));
        }
        self.steps.push(FrameStep::Blit(region));
        Ok(())
    }

    fn present(&mut self, frame: HeadlessFrame) {
        self.presented += 1;
        self.steps.push(FrameStep::Present { draws: frame.draws });
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.pending)
    }
}
