//! frameloop demo - Main Entry Point
//!
//! Opens a window and renders a few animated cubes through the frame
//! orchestrator until the window is closed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use frameloop_core::{FrameTimer, PresentModePreference, PresentationSurface, RendererConfig};
use frameloop_platform::EventPump;
use frameloop_renderer::{Renderer, TickOutcome};
use frameloop_scene::Scene;

/// How often the FPS line is logged, in frames.
const FPS_LOG_INTERVAL: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
/// Preferred swapchain present mode.
enum CliPresentMode {
    #[default]
    Mailbox,
    Fifo,
    Immediate,
}

impl From<CliPresentMode> for PresentModePreference {
    fn from(mode: CliPresentMode) -> Self {
        match mode {
            CliPresentMode::Mailbox => Self::Mailbox,
            CliPresentMode::Fifo => Self::Fifo,
            CliPresentMode::Immediate => Self::Immediate,
        }
    }
}

#[derive(clap::Parser, Debug)]
#[command(about = "Animated cubes rendered through the frameloop orchestrator", long_about = None)]
struct CliArgs {
    /// Initial window width.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Initial window height.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Frames the CPU may queue ahead of the GPU.
    #[arg(short, long, default_value_t = 2)]
    frames_in_flight: usize,

    /// Frame-rate cap; 0 disables it.
    #[arg(long, default_value_t = 0)]
    max_fps: u32,

    #[arg(long, default_value = "mailbox")]
    present_mode: CliPresentMode,

    /// MSAA samples per pixel (1 disables); lowered to what the GPU supports.
    #[arg(long, default_value_t = 4)]
    msaa: u32,

    /// Directory with scene.vert.spv and scene.frag.spv.
    #[arg(long, default_value = "shaders/spirv")]
    shader_dir: PathBuf,

    /// Force the validation layer on, even in release builds.
    #[arg(long, conflicts_with = "no_validation")]
    validation: bool,

    /// Force the validation layer off, even in debug builds.
    #[arg(long)]
    no_validation: bool,

    /// Exit after this many presented frames.
    #[arg(long)]
    frames: Option<u64>,
}

impl CliArgs {
    fn config(&self) -> Result<RendererConfig> {
        let validation = if self.validation {
            true
        } else if self.no_validation {
            false
        } else {
            cfg!(debug_assertions)
        };

        let config = RendererConfig::builder()
            .size(self.width, self.height)
            .title("frameloop")
            .frames_in_flight(self.frames_in_flight)
            .max_fps(self.max_fps)
            .present_mode(self.present_mode.into())
            .msaa_samples(self.msaa)
            .shader_dir(&self.shader_dir)
            .validation(validation)
            .build()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    frameloop_core::init_logging();
    let args = CliArgs::parse();
    let config = Arc::new(args.config().context("Invalid configuration")?);
    info!("Starting frameloop: {:?}", config);

    let mut events = EventPump::new(&config).context("Failed to open window")?;
    let mut renderer = Renderer::new(&mut events, config.clone(), Scene::demo())
        .context("Failed to initialize renderer")?;
    info!("Initialization complete, entering main loop");

    let mut timer = FrameTimer::with_max_fps(config.max_fps);
    let mut presented = 0u64;

    loop {
        events.poll_events();
        if events.close_requested() {
            info!("Close requested, shutting down");
            break;
        }

        match renderer.render_frame(&mut events, timer.elapsed())? {
            TickOutcome::Presented => presented += 1,
            TickOutcome::PresentedAndRecreated => {
                presented += 1;
                info!(
                    "Surface rebuilt at {} (generation {})",
                    renderer.orchestrator().extent(),
                    renderer.orchestrator().generation()
                );
            }
            TickOutcome::SkippedOutOfDate => debug!("Frame skipped, surface was out of date"),
            TickOutcome::Closed => {
                info!("Window closed while minimized, shutting down");
                break;
            }
        }

        timer.tick();
        if timer.frame_count() % FPS_LOG_INTERVAL == 0 {
            info!("{} fps ({} frames presented)", timer.fps(), presented);
        }
        if args.frames.is_some_and(|limit| presented >= limit) {
            info!("Presented {} frames, exiting", presented);
            break;
        }
    }

    drop(renderer);
    Ok(())
}
