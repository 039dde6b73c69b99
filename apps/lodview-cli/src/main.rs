use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use glam::DVec3;
use lodview_common::Extent2;
use lodview_input::InputEvent;
use lodview_render::headless::{FrameStep, HeadlessBackend, HeadlessDevice};
use lodview_render::{
    BufferKind, DriverConfig, FixedControls, FrameDriver, FrameOutcome, GpuBuffer, RenderContext,
    Scene,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lodview-cli", about = "Headless tools for the lodview frame loop")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Print the default driver configuration as JSON
    Config,
    /// Run the frame loop against the headless backend on a simulated clock
    Frames {
        /// Number of frames to run
        #[arg(short, long, default_value = "3")]
        count: u64,
        #[arg(long, default_value = "800")]
        width: u32,
        #[arg(long, default_value = "600")]
        height: u32,
        /// Simulated frame interval in milliseconds
        #[arg(long, default_value = "16")]
        interval_ms: u64,
        /// Frame index at which the window is resized to `resize_width` x `resize_height`
        #[arg(long)]
        resize_at: Option<u64>,
        #[arg(long, default_value = "1024")]
        resize_width: u32,
        #[arg(long, default_value = "768")]
        resize_height: u32,
        /// Paths delivered as one drop batch before the first frame
        #[arg(long)]
        drop: Vec<PathBuf>,
        /// Print every backend call
        #[arg(long)]
        trace: bool,
    },
    /// Write a byte pattern into a buffer and read it back
    Readback {
        #[arg(long, value_enum, default_value = "plain")]
        kind: Kind,
        /// Buffer size in bytes
        #[arg(long, default_value = "256")]
        size: u64,
        #[arg(long, default_value = "0")]
        offset: u64,
        #[arg(long, default_value = "16")]
        len: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Plain,
    Sparse,
    Uniform,
}

impl From<Kind> for BufferKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Plain => BufferKind::Plain,
            Kind::Sparse => BufferKind::Sparse,
            Kind::Uniform => BufferKind::Uniform,
        }
    }
}

/// Records one draw per frame so the trace shows where the scene ran.
struct MarkerScene;

impl Scene<HeadlessBackend> for MarkerScene {
    fn render(
        &mut self,
        ctx: RenderContext<'_, HeadlessBackend>,
    ) -> Result<(), lodview_render::GpuError> {
        let eye = ctx.state.camera.position;
        ctx.frame.draw(format!(
            "marker into {} at eye ({:.1}, {:.1}, {:.1})",
            ctx.target.extent(),
            eye.x,
            eye.y,
            eye.z
        ));
        Ok(())
    }
}

fn describe(step: &FrameStep) -> String {
    match step {
        FrameStep::Acquire(size) => format!("acquire {size}"),
        FrameStep::BindSurface(vp) => format!("bind surface {}", vp.extent),
        FrameStep::BindFramebuffer {
            framebuffer,
            color,
            viewport,
        } => match color {
            Some(color) => format!("bind {framebuffer} (color {color}) {}", viewport.extent),
            None => format!("bind {framebuffer} {}", viewport.extent),
        },
        FrameStep::BeginOverlay => "begin overlay".into(),
        FrameStep::Toggle { clicked } => format!("toggle clicked={clicked}"),
        FrameStep::PerfPanel { fps, samples } => {
            format!("perf panel fps={fps:.1} samples={samples}")
        }
        FrameStep::EndOverlay => "end overlay".into(),
        FrameStep::Blit(region) => format!(
            "blit {} -> {} ({:?})",
            region.src.extent, region.dst.extent, region.filter
        ),
        FrameStep::Present { draws } => format!("present draws={}", draws.len()),
    }
}

fn run_frames(
    count: u64,
    size: Extent2,
    interval: Duration,
    resize: Option<(u64, Extent2)>,
    drop: Vec<PathBuf>,
    trace: bool,
) -> Result<()> {
    let device = HeadlessDevice::new();
    let mut backend = HeadlessBackend::with_device(device.clone(), size);
    let start = Instant::now();
    let controls = FixedControls::look_at(DVec3::new(0.0, 10.0, 15.0), DVec3::ZERO, DVec3::Y);
    let mut driver = FrameDriver::new_at(
        &device,
        DriverConfig::default(),
        Box::new(controls),
        start,
    )?;
    driver.add_drop_listener(|paths| {
        for path in paths {
            println!("dropped: {}", path.display());
        }
    });
    if !drop.is_empty() {
        backend.push_event(InputEvent::Drop { paths: drop });
    }

    let mut scene = MarkerScene;
    for frame in 0..count {
        if let Some((at, extent)) = resize {
            if frame == at {
                backend.set_window_size(extent);
            }
        }
        let now = start + interval * (frame as u32 + 1);
        let outcome = driver
            .run_frame_at(now, &mut backend, &mut scene)
            .with_context(|| format!("frame {frame}"))?;

        let steps = backend.take_steps();
        if trace {
            println!("frame {frame}: {outcome:?}");
            for step in &steps {
                println!("  {}", describe(step));
            }
        }
        if outcome == FrameOutcome::Exit {
            break;
        }
    }

    let timer = driver.timer();
    let recorded = timer.frame_count().min(timer.history().len() as u64) as usize;
    let mean_ms = if recorded == 0 {
        0.0
    } else {
        timer.history()[..recorded].iter().sum::<f32>() / recorded as f32
    };
    println!(
        "frames={} presented={} fps={:.1} mean_frame_ms={mean_ms:.2}",
        timer.frame_count(),
        backend.presented(),
        timer.fps(),
    );
    println!(
        "view={} textures_created={} textures_live={} rebinds={}",
        driver.view().extent(),
        device.textures_created(),
        device.textures_live(),
        driver.view().rebind_count()
    );
    Ok(())
}

fn readback(kind: Kind, size: u64, offset: u64, len: u64) -> Result<()> {
    let device = HeadlessDevice::new();
    let buffer = GpuBuffer::new(&device, "cli_buffer", size, kind.into())?;
    let Some(end) = offset.checked_add(len) else {
        bail!("offset {offset} + len {len} overflows");
    };
    let pattern: Vec<u8> = (offset..end).map(|i| (i % 251) as u8).collect();
    buffer.write(&device, offset, &pattern)?;
    let bytes = buffer.read(&device, offset, len)?;

    let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
    println!("{} {:?} size={}", buffer.id(), buffer.kind(), buffer.size());
    println!("read [{offset}, {end}): {}", hex.join(" "));
    println!(
        "match: {}",
        if bytes == pattern { "OK" } else { "MISMATCH" }
    );
    if matches!(kind, Kind::Sparse) {
        println!("resident pages: {}", buffer.raw().resident_pages());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match cli.command {
        Commands::Info => {
            println!("lodview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", lodview_common::crate_info());
            println!("input: {}", lodview_input::crate_info());
            println!("render: {}", lodview_render::crate_info());
        }
        Commands::Config => {
            let json = serde_json::to_string_pretty(&DriverConfig::default())?;
            println!("{json}");
        }
        Commands::Frames {
            count,
            width,
            height,
            interval_ms,
            resize_at,
            resize_width,
            resize_height,
            drop,
            trace,
        } => {
            let resize = resize_at.map(|at| (at, Extent2::new(resize_width, resize_height)));
            run_frames(
                count,
                Extent2::new(width, height),
                Duration::from_millis(interval_ms),
                resize,
                drop,
                trace,
            )?;
        }
        Commands::Readback {
            kind,
            size,
            offset,
            len,
        } => readback(kind, size, offset, len)?,
    }

    Ok(())
}
