//! Command recording seam.
//!
//! Command buffers are recorded once per target when a surface generation is
//! built and resubmitted every time that target is acquired. Per-frame data
//! reaches the GPU through the target's uniform buffer, not through
//! re-recording.

use frameloop_core::SurfaceExtent;

use crate::backend::RenderBackend;
use crate::targets::TargetHandle;

/// Everything a recorder may bind for one target.
pub struct RecordContext<'a, B: RenderBackend> {
    pub target: TargetHandle,
    pub extent: SurfaceExtent,
    pub targets: &'a B::Targets,
    pub attachments: &'a B::Attachments,
    pub pipeline: &'a B::Pipeline,
    pub framebuffers: &'a B::Framebuffers,
    pub descriptors: &'a B::Descriptors,
}

impl<B: RenderBackend> RecordContext<'_, B> {
    /// Position of the target in its set.
    #[inline]
    pub fn index(&self) -> usize {
        self.target.index() as usize
    }
}

/// Builds the submittable command buffer for one target.
pub trait CommandRecorder<B: RenderBackend> {
    fn record(&mut self, backend: &B, ctx: &RecordContext<'_, B>) -> Result<B::CommandBuffer, B::Error>;
}
