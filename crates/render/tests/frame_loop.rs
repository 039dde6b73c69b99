use glam::{DMat4, DVec2, DVec3};
use lodview_common::Extent2;
use lodview_input::{EventHandler, InputEvent, Key, KeyAction, Modifiers, MouseButton};
use lodview_render::headless::{FrameStep, HeadlessBackend, HeadlessDevice};
use lodview_render::{
    BlitRegion, Controls, DriverConfig, FilterMode, FixedControls, FrameDriver, FrameOutcome,
    GpuError, RenderContext, Scene, UpdateContext, Viewport,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

fn driver_with(
    device: &HeadlessDevice,
    controls: FixedControls,
    start: Instant,
) -> FrameDriver<HeadlessDevice> {
    FrameDriver::new_at(device, DriverConfig::default(), Box::new(controls), start).unwrap()
}

fn setup(size: Extent2) -> (HeadlessDevice, HeadlessBackend, FrameDriver<HeadlessDevice>, Instant) {
    let device = HeadlessDevice::new();
    let backend = HeadlessBackend::with_device(device.clone(), size);
    let start = Instant::now();
    let driver = driver_with(&device, FixedControls::default(), start);
    (device, backend, driver, start)
}

fn frame_at(start: Instant, n: u64) -> Instant {
    start + Duration::from_millis(16 * (n + 1))
}

#[derive(Default)]
struct RecordingScene {
    calls: Vec<&'static str>,
    views_inverse_world: Vec<bool>,
    seen_counter: Vec<u32>,
}

impl Scene<HeadlessBackend> for RecordingScene {
    fn update(&mut self, ctx: UpdateContext<'_, HeadlessDevice>) -> Result<(), GpuError> {
        self.calls.push("update");
        let cam = &ctx.state.camera;
        self.views_inverse_world
            .push((cam.view * cam.world).abs_diff_eq(DMat4::IDENTITY, 1e-9));
        self.seen_counter.push(ctx.state.session.mouse_buttons);
        Ok(())
    }

    fn render(&mut self, ctx: RenderContext<'_, HeadlessBackend>) -> Result<(), GpuError> {
        self.calls.push("render");
        ctx.frame.draw(format!("grid {}", ctx.target.extent()));
        Ok(())
    }
}

#[test]
fn window_800_by_600_resizes_camera_view_and_blit() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(800, 600));
    let outcome = driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut ())
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Continue);

    let cam = &driver.state().camera;
    assert!((cam.aspect - 800.0 / 600.0).abs() < 1e-12);
    assert_eq!(driver.view().extent(), Extent2::new(800, 600));
    assert_eq!(driver.view().depth().extent(), Extent2::new(800, 600));

    let full = Viewport::full(Extent2::new(800, 600));
    let blit = backend
        .steps()
        .iter()
        .find_map(|s| match s {
            FrameStep::Blit(region) => Some(*region),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        blit,
        BlitRegion {
            src: full,
            dst: full,
            filter: FilterMode::Linear,
        }
    );
    assert_eq!(blit.src.x, 0);
    assert_eq!(blit.src.y, 0);
}

#[test]
fn frame_steps_run_in_fixed_order() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(320, 240));
    let mut scene = RecordingScene::default();
    driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut scene)
        .unwrap();

    let viewport = Viewport::full(Extent2::new(320, 240));
    let view = driver.view();
    assert_eq!(
        backend.steps(),
        &[
            FrameStep::Acquire(Extent2::new(320, 240)),
            FrameStep::BindSurface(viewport),
            FrameStep::BindFramebuffer {
                framebuffer: view.id(),
                color: view.color(0).and_then(|t| t.id()),
                viewport,
            },
            FrameStep::BeginOverlay,
            FrameStep::Toggle { clicked: false },
            FrameStep::PerfPanel { fps: 0.0, samples: 1 },
            FrameStep::EndOverlay,
            FrameStep::Blit(view.full_region()),
            FrameStep::BindSurface(viewport),
            FrameStep::Present {
                draws: vec!["grid 320x240".to_string()],
            },
        ]
    );
    assert_eq!(scene.calls, vec!["update", "render"]);
    assert_eq!(scene.views_inverse_world, vec![true]);
}

#[test]
fn dropped_files_reach_every_listener_once() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(64, 64));
    let first = Rc::new(RefCell::new(Vec::new()));
    let second = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = first.clone();
        driver.add_drop_listener(move |paths| seen.borrow_mut().push(paths.to_vec()));
    }
    {
        let seen = second.clone();
        driver.add_drop_listener(move |paths| seen.borrow_mut().push(paths.to_vec()));
    }

    let batch = vec![PathBuf::from("a.txt"), PathBuf::from("b.las")];
    backend.push_event(InputEvent::Drop {
        paths: batch.clone(),
    });
    driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut ())
        .unwrap();
    driver
        .run_frame_at(frame_at(start, 1), &mut backend, &mut ())
        .unwrap();

    assert_eq!(*first.borrow(), vec![batch.clone()]);
    assert_eq!(*second.borrow(), vec![batch]);
}

#[test]
fn removed_drop_listener_is_skipped() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(64, 64));
    let calls = Rc::new(RefCell::new(0));
    let id = {
        let calls = calls.clone();
        driver.add_drop_listener(move |_| *calls.borrow_mut() += 1)
    };
    assert!(driver.remove_drop_listener(id));
    backend.push_event(InputEvent::Drop {
        paths: vec![PathBuf::from("x.las")],
    });
    driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut ())
        .unwrap();
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn escape_ends_the_loop_after_the_frame() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(64, 64));
    backend.push_event(InputEvent::Key {
        key: Key::Escape,
        action: KeyAction::Press,
        modifiers: Modifiers::default(),
    });
    let outcome = driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut ())
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Exit);
    assert_eq!(backend.presented(), 1);
    assert_eq!(driver.timer().frame_count(), 1);
}

#[test]
fn run_stops_on_close_request() {
    let (_device, mut backend, mut driver, _start) = setup(Extent2::new(16, 16));
    let frames = Rc::new(RefCell::new(0u32));

    struct CloseAfter {
        frames: Rc<RefCell<u32>>,
    }
    impl Scene<HeadlessBackend> for CloseAfter {
        fn update(&mut self, ctx: UpdateContext<'_, HeadlessDevice>) -> Result<(), GpuError> {
            *self.frames.borrow_mut() += 1;
            if *self.frames.borrow() == 3 {
                ctx.state.session.request_close();
            }
            Ok(())
        }
    }

    driver
        .run(&mut backend, &mut CloseAfter { frames: frames.clone() })
        .unwrap();
    assert_eq!(*frames.borrow(), 3);
    assert_eq!(backend.presented(), 3);
}

#[test]
fn queued_tasks_run_before_update() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(64, 64));
    let sender = driver.task_sender();
    let nested = sender.clone();
    sender
        .enqueue(move |state| {
            state.session.mouse_buttons = 7;
            nested
                .enqueue(|state| state.session.mouse_buttons = 9)
                .unwrap();
        })
        .unwrap();

    let mut scene = RecordingScene::default();
    driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut scene)
        .unwrap();
    driver
        .run_frame_at(frame_at(start, 1), &mut backend, &mut scene)
        .unwrap();

    // the nested task was queued mid-drain, so it lands one frame later
    assert_eq!(scene.seen_counter, vec![7, 9]);
}

#[test]
fn tasks_can_be_queued_from_other_threads() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(64, 64));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let sender = driver.task_sender();
            std::thread::spawn(move || {
                sender
                    .enqueue(move |state| state.session.mouse_buttons |= 1 << i)
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut ())
        .unwrap();
    assert_eq!(driver.state().session.mouse_buttons, 0b1111);
}

#[test]
fn static_size_never_reallocates() {
    let (device, mut backend, mut driver, start) = setup(Extent2::new(1280, 720));
    driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut ())
        .unwrap();
    let created = device.textures_created();
    let color = driver.view().color(0).and_then(|t| t.id());

    for n in 1..50 {
        driver
            .run_frame_at(frame_at(start, n), &mut backend, &mut ())
            .unwrap();
    }
    assert_eq!(device.textures_created(), created);
    assert_eq!(driver.view().color(0).and_then(|t| t.id()), color);
    assert_eq!(device.textures_live(), 2);
}

#[test]
fn resize_rebinds_new_attachments() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(100, 100));
    driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut ())
        .unwrap();
    let before = driver.view().color(0).and_then(|t| t.id());

    backend.set_window_size(Extent2::new(200, 50));
    backend.take_steps();
    driver
        .run_frame_at(frame_at(start, 1), &mut backend, &mut ())
        .unwrap();

    let after = driver.view().color(0).and_then(|t| t.id());
    assert_ne!(before, after);
    let bound = backend.steps().iter().find_map(|s| match s {
        FrameStep::BindFramebuffer { color, .. } => Some(*color),
        _ => None,
    });
    assert_eq!(bound, Some(after));
    assert!((driver.state().camera.aspect - 4.0).abs() < 1e-12);
}

#[test]
fn empty_window_skips_gpu_work() {
    let (device, mut backend, mut driver, start) = setup(Extent2::new(0, 0));
    let created = device.textures_created();
    let outcome = driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut ())
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Skipped);
    assert!(backend.steps().is_empty());
    assert_eq!(device.textures_created(), created);
    assert_eq!(driver.view().extent(), Extent2::new(128, 128));
    assert_eq!(driver.timer().frame_count(), 0);
}

#[test]
fn lost_surface_skips_the_frame() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(64, 64));
    backend.make_surface_unavailable(1);
    let outcome = driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut ())
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Skipped);
    assert_eq!(backend.presented(), 0);

    let outcome = driver
        .run_frame_at(frame_at(start, 1), &mut backend, &mut ())
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Continue);
    assert_eq!(backend.presented(), 1);
    // the skipped 16 ms are part of the first recorded sample
    assert!((driver.timer().history()[0] - 0.032).abs() < 1e-6);
}

#[test]
fn toggle_hides_the_perf_panel() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(64, 64));
    backend.click_toggle_next_frame();
    driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut ())
        .unwrap();
    assert!(!driver.state().session.show_gui);

    let steps = backend.take_steps();
    // the panel for the clicked frame is already suppressed
    assert!(steps.contains(&FrameStep::Toggle { clicked: true }));
    assert!(!steps.iter().any(|s| matches!(s, FrameStep::PerfPanel { .. })));

    driver
        .run_frame_at(frame_at(start, 1), &mut backend, &mut ())
        .unwrap();
    assert!(!backend.steps().iter().any(|s| matches!(s, FrameStep::PerfPanel { .. })));
}

#[test]
fn camera_follows_controls() {
    let device = HeadlessDevice::new();
    let mut backend = HeadlessBackend::with_device(device.clone(), Extent2::new(64, 32));
    let start = Instant::now();
    let eye = DVec3::new(0.0, 10.0, 15.0);
    let mut driver = driver_with(
        &device,
        FixedControls::look_at(eye, DVec3::ZERO, DVec3::Y),
        start,
    );
    driver
        .run_frame_at(frame_at(start, 0), &mut backend, &mut ())
        .unwrap();

    let cam = &driver.state().camera;
    assert!(cam.position.abs_diff_eq(eye, 1e-9));
    assert!((cam.view * cam.world).abs_diff_eq(DMat4::IDENTITY, 1e-9));
    assert!((cam.aspect - 2.0).abs() < 1e-12);
}

#[test]
fn fps_and_history_advance_per_frame() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(64, 64));
    // 10 ms frames; the estimate appears once a full second has passed
    for n in 0..150u64 {
        driver
            .run_frame_at(start + Duration::from_millis(10 * (n + 1)), &mut backend, &mut ())
            .unwrap();
    }
    let timer = driver.timer();
    assert_eq!(timer.frame_count(), 150);
    assert_eq!(timer.history().len(), 1000);
    assert!((timer.history()[149] - 0.010).abs() < 1e-6);
    // the tick at 1.0 s had seen 99 completed frames
    assert!((timer.fps() - 99.0).abs() < 1e-9);
    assert_eq!(driver.perf().frames.len(), 150);
}

/// Fixed controls that also remember every event they were handed.
struct LoggingControls {
    world: DMat4,
    seen: Rc<RefCell<Vec<InputEvent>>>,
}

impl Controls for LoggingControls {
    fn world(&self) -> DMat4 {
        self.world
    }

    fn handle_event(&mut self, event: &InputEvent) {
        self.seen.borrow_mut().push(event.clone());
    }
}

#[test]
fn direct_handler_calls_update_session_and_controls() {
    let device = HeadlessDevice::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let controls = LoggingControls {
        world: DMat4::IDENTITY,
        seen: seen.clone(),
    };
    let mut driver =
        FrameDriver::new_at(&device, DriverConfig::default(), Box::new(controls), Instant::now())
            .unwrap();

    driver.on_mouse_button(MouseButton::Left, KeyAction::Press, Modifiers::default());
    driver.on_mouse_move(DVec2::new(5.0, 6.0));
    driver.on_scroll(DVec2::new(0.0, -1.0));
    driver.on_key(Key::Escape, KeyAction::Press, Modifiers::default());

    let session = &driver.state().session;
    assert!(session.close_requested());
    assert!(session.button_down(MouseButton::Left));
    assert_eq!(session.mouse_position, DVec2::new(5.0, 6.0));
    assert_eq!(seen.borrow().len(), 4);
    assert_eq!(
        seen.borrow()[3],
        InputEvent::Key {
            key: Key::Escape,
            action: KeyAction::Press,
            modifiers: Modifiers::default(),
        }
    );
}

#[test]
fn drops_reach_controls_and_listeners() {
    let device = HeadlessDevice::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let controls = LoggingControls {
        world: DMat4::IDENTITY,
        seen: seen.clone(),
    };
    let mut driver =
        FrameDriver::new_at(&device, DriverConfig::default(), Box::new(controls), Instant::now())
            .unwrap();
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();
    driver.add_drop_listener(move |paths| sink.borrow_mut().push(paths.to_vec()));

    let paths = vec![PathBuf::from("a.txt"), PathBuf::from("b.las")];
    driver.on_drop(&paths);

    assert_eq!(*received.borrow(), vec![paths.clone()]);
    assert_eq!(*seen.borrow(), vec![InputEvent::Drop { paths }]);
}

/// Moves the camera in `update` and checks the matrices `render` sees.
#[derive(Default)]
struct MovingCameraScene {
    render_view_matches: Vec<bool>,
}

impl Scene<HeadlessBackend> for MovingCameraScene {
    fn update(&mut self, ctx: UpdateContext<'_, HeadlessDevice>) -> Result<(), GpuError> {
        ctx.state
            .camera
            .set_world(DMat4::from_translation(DVec3::new(4.0, 2.0, -7.0)));
        Ok(())
    }

    fn render(&mut self, ctx: RenderContext<'_, HeadlessBackend>) -> Result<(), GpuError> {
        let cam = &ctx.state.camera;
        let moved = cam
            .world
            .abs_diff_eq(DMat4::from_translation(DVec3::new(4.0, 2.0, -7.0)), 1e-12);
        let inverse = (cam.view * cam.world).abs_diff_eq(DMat4::IDENTITY, 1e-9);
        self.render_view_matches.push(moved && inverse);
        Ok(())
    }
}

#[test]
fn camera_changes_in_update_reach_render() {
    let (_device, mut backend, mut driver, start) = setup(Extent2::new(64, 64));
    let mut scene = MovingCameraScene::default();
    for n in 0..2 {
        driver
            .run_frame_at(frame_at(start, n), &mut backend, &mut scene)
            .unwrap();
    }
    assert_eq!(scene.render_view_matches, vec![true, true]);
}
