//! Core utilities shared by every frameloop crate.
//!
//! This crate provides foundational types used across the renderer:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing with an optional frame-rate cap
//! - The immutable renderer configuration
//! - The presentation-surface contract between windowing and rendering

mod config;
mod error;
mod logging;
mod surface;
mod timer;

pub use config::{
    MAX_MSAA_SAMPLES, PresentModePreference, RendererConfig, RendererConfigBuilder,
    UNBOUNDED_TIMEOUT,
};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use surface::{PresentationSurface, ResizeFlag, SurfaceExtent};
pub use timer::FrameTimer;
