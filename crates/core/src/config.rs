//! Renderer configuration.
//!
//! [`RendererConfig`] is built once at startup, validated, and then shared
//! read-only (usually behind an `Arc`) by the frame orchestrator, the
//! recreation protocol and the Vulkan backend.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Timeout value meaning "wait forever" for fence waits and image acquisition.
pub const UNBOUNDED_TIMEOUT: u64 = u64::MAX;

/// Highest sample count Vulkan defines.
pub const MAX_MSAA_SAMPLES: u32 = 64;

/// Preferred presentation mode. The backend falls back to FIFO when the
/// preferred mode is not supported by the surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentModePreference {
    /// Low-latency triple buffering without tearing.
    #[default]
    Mailbox,
    /// Classic vsync. Always available.
    Fifo,
    /// No vsync; may tear.
    Immediate,
}

/// Immutable renderer configuration.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Initial window width in physical pixels.
    pub width: u32,
    /// Initial window height in physical pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
    /// Number of frames the CPU may queue ahead of the GPU.
    pub frames_in_flight: usize,
    /// Enable the Khronos validation layer when available.
    pub enable_validation: bool,
    /// Timeout in nanoseconds for CPU fence waits.
    pub fence_timeout_ns: u64,
    /// Timeout in nanoseconds for swapchain image acquisition.
    pub acquire_timeout_ns: u64,
    /// Frame-rate cap; 0 disables the cap.
    pub max_fps: u32,
    /// Background clear color (linear RGBA).
    pub clear_color: [f32; 4],
    /// Directory holding the compiled SPIR-V shaders.
    pub shader_dir: PathBuf,
    /// Preferred presentation mode.
    pub present_mode: PresentModePreference,
    /// Requested MSAA samples per pixel (power of two, 1 disables). The
    /// backend lowers it to what the device supports.
    pub msaa_samples: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "frameloop".to_string(),
            frames_in_flight: 2,
            enable_validation: cfg!(debug_assertions),
            fence_timeout_ns: UNBOUNDED_TIMEOUT,
            acquire_timeout_ns: UNBOUNDED_TIMEOUT,
            max_fps: 0,
            clear_color: [50.0 / 255.0, 150.0 / 255.0, 1.0, 1.0],
            shader_dir: PathBuf::from("shaders/spirv"),
            present_mode: PresentModePreference::Mailbox,
            msaa_samples: 4,
        }
    }
}

impl RendererConfig {
    /// Starts a builder from the default configuration.
    pub fn builder() -> RendererConfigBuilder {
        RendererConfigBuilder {
            config: Self::default(),
        }
    }

    /// Checks the invariants the renderer relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when there are no frames in flight, the
    /// initial window has no area, a timeout is zero, or the MSAA sample
    /// count is not a power of two up to 64.
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::Config(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "initial window size must be nonzero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fence_timeout_ns == 0 || self.acquire_timeout_ns == 0 {
            return Err(Error::Config("timeouts must be nonzero".to_string()));
        }
        if !self.msaa_samples.is_power_of_two() || self.msaa_samples > MAX_MSAA_SAMPLES {
            return Err(Error::Config(format!(
                "msaa_samples must be a power of two between 1 and {}, got {}",
                MAX_MSAA_SAMPLES, self.msaa_samples
            )));
        }
        Ok(())
    }

    /// Aspect ratio of the initial window.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Builder for [`RendererConfig`].
#[derive(Clone, Debug)]
pub struct RendererConfigBuilder {
    config: RendererConfig,
}

impl RendererConfigBuilder {
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn frames_in_flight(mut self, count: usize) -> Self {
        self.config.frames_in_flight = count;
        self
    }

    pub fn validation(mut self, enable: bool) -> Self {
        self.config.enable_validation = enable;
        self
    }

    pub fn fence_timeout_ns(mut self, timeout: u64) -> Self {
        self.config.fence_timeout_ns = timeout;
        self
    }

    pub fn acquire_timeout_ns(mut self, timeout: u64) -> Self {
        self.config.acquire_timeout_ns = timeout;
        self
    }

    pub fn max_fps(mut self, fps: u32) -> Self {
        self.config.max_fps = fps;
        self
    }

    pub fn clear_color(mut self, color: [f32; 4]) -> Self {
        self.config.clear_color = color;
        self
    }

    pub fn shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.shader_dir = dir.into();
        self
    }

    pub fn present_mode(mut self, mode: PresentModePreference) -> Self {
        self.config.present_mode = mode;
        self
    }

    pub fn msaa_samples(mut self, samples: u32) -> Self {
        self.config.msaa_samples = samples;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// See [`RendererConfig::validate`].
    pub fn build(self) -> Result<RendererConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
