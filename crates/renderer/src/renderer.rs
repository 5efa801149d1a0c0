//! Main renderer: the Vulkan objects that outlive every surface generation,
//! plus the frame orchestrator that owns the rest.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use frameloop_core::{PresentationSurface, RendererConfig};
use frameloop_platform::{EventPump, Surface};
use frameloop_rhi::RhiError;
use frameloop_rhi::device::Device;
use frameloop_rhi::instance::Instance;
use frameloop_rhi::physical_device::select_physical_device;
use frameloop_scene::Scene;

use crate::error::FrameError;
use crate::orchestrator::{FrameOrchestrator, TickOutcome};
use crate::vulkan::{SceneRecorder, VulkanBackend};

pub type SceneOrchestrator = FrameOrchestrator<VulkanBackend, SceneRecorder, Scene>;

/// Anything that can go wrong while bringing the renderer up.
#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Platform(#[from] frameloop_core::Error),

    #[error(transparent)]
    Rhi(#[from] RhiError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// # Resource Destruction Order
///
/// 1. Orchestrator: waits on every frame slot, drains the device, destroys
///    the surface resources, then the slots, the mesh and the backend objects
/// 2. Logical device (last `Arc`)
/// 3. Window surface
/// 4. Instance
///
/// Field order below is that order.
pub struct Renderer {
    orchestrator: SceneOrchestrator,
    device: Arc<Device>,
    surface: Surface,
    instance: Arc<Instance>,
}

impl Renderer {
    /// Brings up Vulkan for the pump's window and builds the first surface
    /// generation for `scene`.
    ///
    /// # Errors
    ///
    /// Returns an error if the window is missing or any Vulkan object cannot
    /// be created.
    pub fn new(
        events: &mut EventPump,
        config: Arc<RendererConfig>,
        scene: Scene,
    ) -> Result<Self, RendererError> {
        let window = events
            .window()
            .ok_or_else(|| frameloop_core::Error::Window("Event pump has no window".to_string()))?;
        info!("Initializing Vulkan renderer ({})", window.extent());

        let extensions = window.required_extensions()?;
        let instance = Arc::new(Instance::new(
            c"frameloop",
            config.enable_validation,
            &extensions,
        )?);
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        info!("Selected GPU: {}", physical_device.device_name());
        let device = Device::new(&instance, &physical_device)?;

        let backend = VulkanBackend::new(instance.clone(), device.clone(), &surface, &config)?;
        let recorder = SceneRecorder::new(
            &device,
            scene.mesh(),
            scene.model_count(),
            config.clear_color,
        )?;
        let orchestrator = FrameOrchestrator::new(backend, recorder, scene, config, events)?;

        info!(
            "Renderer initialized: {} frames in flight, {} targets",
            orchestrator.slot_count(),
            orchestrator
                .resources()
                .targets()
                .map_or(0, |targets| targets.len())
        );

        Ok(Self {
            orchestrator,
            device,
            surface,
            instance,
        })
    }

    /// Renders one frame. See [`FrameOrchestrator::tick`].
    pub fn render_frame<S>(
        &mut self,
        surface: &mut S,
        elapsed: Duration,
    ) -> Result<TickOutcome, FrameError>
    where
        S: PresentationSurface + ?Sized,
    {
        self.orchestrator.tick(surface, elapsed)
    }

    #[inline]
    pub fn orchestrator(&self) -> &SceneOrchestrator {
        &self.orchestrator
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    #[inline]
    pub fn has_validation(&self) -> bool {
        self.instance.has_validation()
    }
}
