//! Resource recreation protocol.
//!
//! Everything derived from the presentable targets lives in
//! [`SurfaceResources`] and is rebuilt wholesale whenever the surface goes
//! stale:
//!
//! ```text
//! 1. Wait for a nonzero surface extent (blocks on platform events)
//! 2. Drain all GPU work
//! 3. Destroy, consumers first:
//!    command buffers -> framebuffers -> pipeline (only if its key changed)
//!    -> attachments -> target set -> uniform buffers -> descriptors
//! 4. Rebuild in reverse:
//!    target set -> attachments -> pipeline (if destroyed) -> framebuffers
//!    -> uniform buffers -> descriptors -> command buffers
//! 5. Start the new generation with an empty claim table
//! ```
//!
//! The first generation is built by the same code with nothing to destroy.

use frameloop_core::{PresentationSurface, SurfaceExtent};
use tracing::{debug, info, info_span};

use crate::backend::{RenderBackend, SurfaceStatus};
use crate::error::{FrameError, RecreationStage};
use crate::recorder::{CommandRecorder, RecordContext};
use crate::slots::SlotId;
use crate::targets::{Acquisition, SurfaceSet, TargetHandle};

/// A resource together with the surface generation it is valid for.
#[derive(Debug)]
pub struct Tagged<T> {
    generation: u64,
    value: T,
}

impl<T> Tagged<T> {
    fn new(value: T, generation: u64) -> Self {
        Self { generation, value }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }
}

struct PipelineEntry<B: RenderBackend> {
    key: B::PipelineKey,
    pipeline: B::Pipeline,
}

/// How a recreation attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecreateOutcome {
    Rebuilt { generation: u64 },
    /// The window was closed while waiting for a visible surface. Nothing
    /// was destroyed or rebuilt.
    Closed,
}

/// Every GPU resource whose lifetime is bound to one target set.
pub struct SurfaceResources<B: RenderBackend> {
    generation: u64,
    command_buffers: Vec<Tagged<B::CommandBuffer>>,
    framebuffers: Option<Tagged<B::Framebuffers>>,
    pipeline: Option<Tagged<PipelineEntry<B>>>,
    attachments: Option<Tagged<B::Attachments>>,
    targets: Option<SurfaceSet<B::Targets>>,
    uniforms: Option<Tagged<B::UniformBuffers>>,
    descriptors: Option<Tagged<B::Descriptors>>,
}

impl<B: RenderBackend> Default for SurfaceResources<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: RenderBackend> SurfaceResources<B> {
    /// An empty set at generation 0. Nothing is built until the first
    /// [`recreate`].
    pub fn new() -> Self {
        Self {
            generation: 0,
            command_buffers: Vec::new(),
            framebuffers: None,
            pipeline: None,
            attachments: None,
            targets: None,
            uniforms: None,
            descriptors: None,
        }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.targets.is_some()
    }

    #[inline]
    pub fn targets(&self) -> Option<&SurfaceSet<B::Targets>> {
        self.targets.as_ref()
    }

    /// Extent of the current target set, zero when nothing is built.
    pub fn extent(&self) -> SurfaceExtent {
        self.targets
            .as_ref()
            .map(SurfaceSet::extent)
            .unwrap_or_default()
    }

    pub fn pipeline_key(&self) -> Option<&B::PipelineKey> {
        self.pipeline.as_ref().map(|entry| &entry.value.key)
    }

    /// Generation tag of every live resource, by name.
    pub fn tags(&self) -> Vec<(&'static str, u64)> {
        let mut tags = Vec::new();
        if let Some(targets) = &self.targets {
            tags.push(("targets", targets.generation()));
        }
        if let Some(r) = &self.attachments {
            tags.push(("attachments", r.generation));
        }
        if let Some(r) = &self.pipeline {
            tags.push(("pipeline", r.generation));
        }
        if let Some(r) = &self.framebuffers {
            tags.push(("framebuffers", r.generation));
        }
        if let Some(r) = &self.uniforms {
            tags.push(("uniform buffers", r.generation));
        }
        if let Some(r) = &self.descriptors {
            tags.push(("descriptors", r.generation));
        }
        tags.extend(
            self.command_buffers
                .iter()
                .map(|r| ("command buffer", r.generation)),
        );
        tags
    }

    fn stale(&self, handle: TargetHandle) -> FrameError {
        FrameError::StaleTarget {
            handle,
            current: self.generation,
        }
    }

    /// Acquires the next target. Having no target set counts as out of date.
    pub fn acquire_next(
        &self,
        backend: &B,
        ready: &B::Semaphore,
        timeout_ns: u64,
    ) -> Result<Acquisition, FrameError> {
        match &self.targets {
            Some(targets) => targets.acquire_next(backend, ready, timeout_ns),
            None => Ok(Acquisition::OutOfDate),
        }
    }

    pub fn claimant(&self, handle: TargetHandle) -> Result<Option<SlotId>, FrameError> {
        match &self.targets {
            Some(targets) => targets.claimant(handle),
            None => Err(self.stale(handle)),
        }
    }

    pub fn claim(&mut self, handle: TargetHandle, slot: SlotId) -> Result<Option<SlotId>, FrameError> {
        let current = self.generation;
        match &mut self.targets {
            Some(targets) => targets.claim(handle, slot),
            None => Err(FrameError::StaleTarget { handle, current }),
        }
    }

    /// The pre-recorded commands for `handle`, checked against the current
    /// generation.
    pub fn command_buffer(&self, handle: TargetHandle) -> Result<&B::CommandBuffer, FrameError> {
        let index = match &self.targets {
            Some(targets) => targets.validate(handle)?,
            None => return Err(self.stale(handle)),
        };
        match self.command_buffers.get(index) {
            Some(tagged) if tagged.generation == handle.generation() => Ok(&tagged.value),
            _ => Err(self.stale(handle)),
        }
    }

    pub fn write_uniforms(
        &self,
        backend: &B,
        handle: TargetHandle,
        bytes: &[u8],
    ) -> Result<(), FrameError> {
        let (Some(targets), Some(uniforms)) = (&self.targets, &self.uniforms) else {
            return Err(self.stale(handle));
        };
        let index = targets.validate(handle)?;
        if uniforms.generation != handle.generation() {
            return Err(self.stale(handle));
        }
        backend
            .write_uniforms(&uniforms.value, index, bytes)
            .map_err(|e| FrameError::backend("write uniforms", B::error_kind(&e), e))
    }

    pub fn present(
        &self,
        backend: &B,
        handle: TargetHandle,
        wait: &B::Semaphore,
    ) -> Result<SurfaceStatus, FrameError> {
        let Some(targets) = &self.targets else {
            return Err(self.stale(handle));
        };
        targets.validate(handle)?;
        backend
            .present(targets.targets(), handle.index(), wait)
            .map_err(|e| FrameError::backend("present", B::error_kind(&e), e))
    }

    /// Destroys everything in consumer-first order.
    ///
    /// The pipeline survives when `keep_pipeline_for` matches the key it was
    /// built with.
    fn teardown(&mut self, keep_pipeline_for: Option<&B::PipelineKey>) {
        if !self.command_buffers.is_empty() {
            debug!("Destroying {} command buffers", self.command_buffers.len());
            self.command_buffers.clear();
        }
        if self.framebuffers.take().is_some() {
            debug!("Destroyed framebuffers");
        }
        let keep = match (&self.pipeline, keep_pipeline_for) {
            (Some(entry), Some(key)) => entry.value.key == *key,
            _ => false,
        };
        if !keep && self.pipeline.take().is_some() {
            debug!("Destroyed pipeline");
        }
        if self.attachments.take().is_some() {
            debug!("Destroyed attachments");
        }
        if let Some(targets) = self.targets.take() {
            debug!("Destroying target set of generation {}", targets.generation());
            drop(targets);
        }
        if self.uniforms.take().is_some() {
            debug!("Destroyed uniform buffers");
        }
        if self.descriptors.take().is_some() {
            debug!("Destroyed descriptors");
        }
    }

    /// Destroys everything, pipeline included. Used at shutdown after the
    /// device has been drained.
    pub fn destroy(&mut self) {
        self.teardown(None);
    }

    fn rebuild<R>(
        &mut self,
        backend: &B,
        recorder: &mut R,
        extent: SurfaceExtent,
        key: B::PipelineKey,
        uniform_size: u64,
        generation: u64,
    ) -> Result<(), FrameError>
    where
        R: CommandRecorder<B>,
    {
        let targets = backend
            .create_targets(extent)
            .map_err(stage_error::<B>(RecreationStage::Targets))?;
        let targets = SurfaceSet::new(targets, generation);
        debug!("Created {} targets at {}", targets.len(), targets.extent());

        let attachments = backend
            .create_attachments(targets.targets())
            .map_err(stage_error::<B>(RecreationStage::Attachments))?;

        let pipeline = match self.pipeline.take() {
            Some(entry) if entry.value.key == key => {
                debug!("Reusing pipeline built for {:?}", key);
                Tagged::new(entry.value, generation)
            }
            _ => {
                let pipeline = backend
                    .create_pipeline(&key)
                    .map_err(stage_error::<B>(RecreationStage::Pipeline))?;
                debug!("Created pipeline for {:?}", key);
                Tagged::new(PipelineEntry { key, pipeline }, generation)
            }
        };

        let framebuffers = backend
            .create_framebuffers(targets.targets(), &attachments)
            .map_err(stage_error::<B>(RecreationStage::Framebuffers))?;

        let uniforms = backend
            .create_uniform_buffers(targets.len(), uniform_size)
            .map_err(stage_error::<B>(RecreationStage::UniformBuffers))?;

        let descriptors = backend
            .create_descriptors(&uniforms)
            .map_err(stage_error::<B>(RecreationStage::Descriptors))?;

        let mut command_buffers = Vec::with_capacity(targets.len());
        for target in targets.handles() {
            let ctx = RecordContext {
                target,
                extent: targets.extent(),
                targets: targets.targets(),
                attachments: &attachments,
                pipeline: &pipeline.value.pipeline,
                framebuffers: &framebuffers,
                descriptors: &descriptors,
            };
            let commands = recorder
                .record(backend, &ctx)
                .map_err(stage_error::<B>(RecreationStage::CommandBuffers))?;
            command_buffers.push(Tagged::new(commands, generation));
        }

        self.generation = generation;
        self.targets = Some(targets);
        self.attachments = Some(Tagged::new(attachments, generation));
        self.pipeline = Some(pipeline);
        self.framebuffers = Some(Tagged::new(framebuffers, generation));
        self.uniforms = Some(Tagged::new(uniforms, generation));
        self.descriptors = Some(Tagged::new(descriptors, generation));
        self.command_buffers = command_buffers;
        Ok(())
    }
}

fn stage_error<B: RenderBackend>(stage: RecreationStage) -> impl FnOnce(B::Error) -> FrameError {
    move |e| FrameError::recreation(stage, B::error_kind(&e), e)
}

/// Blocks on platform events until the surface has a nonzero extent.
///
/// Returns `None` if the window is closed while waiting.
fn wait_for_extent<S>(surface: &mut S) -> Option<SurfaceExtent>
where
    S: PresentationSurface + ?Sized,
{
    let mut extent = surface.extent();
    if extent.is_empty() {
        info!("Surface has zero extent, waiting until it is visible again");
    }
    while extent.is_empty() {
        if surface.close_requested() {
            return None;
        }
        surface.wait_events();
        extent = surface.extent();
    }
    Some(extent)
}

/// Runs the full protocol, moving `resources` to the next generation.
///
/// # Errors
///
/// [`FrameError::Recreation`] naming the first step that failed. The
/// resources are left empty in that case.
pub fn recreate<B, R, S>(
    backend: &B,
    recorder: &mut R,
    surface: &mut S,
    resources: &mut SurfaceResources<B>,
    uniform_size: u64,
) -> Result<RecreateOutcome, FrameError>
where
    B: RenderBackend,
    R: CommandRecorder<B>,
    S: PresentationSurface + ?Sized,
{
    let generation = resources.generation() + 1;
    let span = info_span!("recreate", generation);
    let _enter = span.enter();

    let Some(extent) = wait_for_extent(surface) else {
        info!("Close requested while waiting for the surface");
        return Ok(RecreateOutcome::Closed);
    };
    // This rebuild already uses the latest extent.
    surface.take_resized();

    backend
        .wait_idle()
        .map_err(stage_error::<B>(RecreationStage::Drain))?;

    let key = backend
        .pipeline_requirements()
        .map_err(stage_error::<B>(RecreationStage::Requirements))?;

    resources.teardown(Some(&key));
    if let Err(e) = resources.rebuild(backend, recorder, extent, key, uniform_size, generation) {
        resources.teardown(None);
        return Err(e);
    }

    info!(
        "Surface resources rebuilt: {} targets at {}",
        resources.targets().map_or(0, SurfaceSet::len),
        resources.extent()
    );
    Ok(RecreateOutcome::Rebuilt { generation })
}
