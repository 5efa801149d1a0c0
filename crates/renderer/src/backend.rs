//! The GPU seam of the frame loop.
//!
//! The orchestrator and the recreation protocol only ever talk to the GPU
//! through [`RenderBackend`]. Every resource it hands out is an owned value
//! whose `Drop` destroys the underlying object, so the order in which the
//! frame loop drops them is the order of destruction.

use std::fmt::Debug;

use frameloop_core::SurfaceExtent;

use crate::error::ErrorKind;

/// How well the presentable targets still match the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceStatus {
    Optimal,
    /// Still presentable, but should be rebuilt after this frame.
    Suboptimal,
    /// Not presentable; rebuild before using the targets again.
    OutOfDate,
}

/// Result of asking the backend for the next target.
///
/// `index` is only meaningful when `status` is not
/// [`SurfaceStatus::OutOfDate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Acquired {
    pub index: u32,
    pub status: SurfaceStatus,
}

/// The presentable images of one surface generation (a swapchain).
pub trait PresentTargets {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn extent(&self) -> SurfaceExtent;
}

/// Everything the frame loop needs from the GPU.
pub trait RenderBackend {
    type Error: std::error::Error + Send + Sync + 'static;

    type Semaphore;
    type Fence;
    type Targets: PresentTargets;
    type Attachments;
    /// What a pipeline was built against. A pipeline is only rebuilt when the
    /// key for the new target set differs.
    type PipelineKey: Clone + PartialEq + Debug;
    type Pipeline;
    type Framebuffers;
    type UniformBuffers;
    type Descriptors;
    type CommandBuffer;

    /// Classifies a backend error for [`FrameError::kind`](crate::FrameError::kind).
    fn error_kind(error: &Self::Error) -> ErrorKind;

    // Synchronization

    fn create_semaphore(&self) -> Result<Self::Semaphore, Self::Error>;

    fn create_fence(&self, signaled: bool) -> Result<Self::Fence, Self::Error>;

    fn wait_for_fence(&self, fence: &Self::Fence, timeout_ns: u64) -> Result<(), Self::Error>;

    fn reset_fence(&self, fence: &Self::Fence) -> Result<(), Self::Error>;

    /// Blocks until the device has finished all submitted work.
    fn wait_idle(&self) -> Result<(), Self::Error>;

    // Presentation

    /// Builds the target set for `extent`. The previous set has already been
    /// dropped when this is called.
    fn create_targets(&self, extent: SurfaceExtent) -> Result<Self::Targets, Self::Error>;

    /// Acquires the next target, signaling `ready` once it can be rendered
    /// into. Out-of-date and suboptimal are statuses, not errors.
    fn acquire_next(
        &self,
        targets: &Self::Targets,
        ready: &Self::Semaphore,
        timeout_ns: u64,
    ) -> Result<Acquired, Self::Error>;

    /// Submits `commands`, waiting on `wait` at color-attachment output and
    /// signaling `signal` and `fence` on completion.
    fn submit(
        &self,
        commands: &Self::CommandBuffer,
        wait: &Self::Semaphore,
        signal: &Self::Semaphore,
        fence: &Self::Fence,
    ) -> Result<(), Self::Error>;

    fn present(
        &self,
        targets: &Self::Targets,
        index: u32,
        wait: &Self::Semaphore,
    ) -> Result<SurfaceStatus, Self::Error>;

    // Dependent resources

    /// The pipeline key the next target set will need, queried before the
    /// current set is torn down.
    fn pipeline_requirements(&self) -> Result<Self::PipelineKey, Self::Error>;

    fn create_attachments(&self, targets: &Self::Targets) -> Result<Self::Attachments, Self::Error>;

    fn create_pipeline(&self, key: &Self::PipelineKey) -> Result<Self::Pipeline, Self::Error>;

    /// Per-target attachment bindings: each target plus the shared attachments.
    fn create_framebuffers(
        &self,
        targets: &Self::Targets,
        attachments: &Self::Attachments,
    ) -> Result<Self::Framebuffers, Self::Error>;

    /// One host-visible uniform buffer of `size` bytes per target.
    fn create_uniform_buffers(
        &self,
        count: usize,
        size: u64,
    ) -> Result<Self::UniformBuffers, Self::Error>;

    /// A descriptor pool and one set per uniform buffer.
    fn create_descriptors(
        &self,
        uniforms: &Self::UniformBuffers,
    ) -> Result<Self::Descriptors, Self::Error>;

    fn write_uniforms(
        &self,
        uniforms: &Self::UniformBuffers,
        index: usize,
        bytes: &[u8],
    ) -> Result<(), Self::Error>;
}
