//! The per-frame state machine.
//!
//! ```text
//! Idle -> WaitingForSlot -> Acquiring -> Recording -> Submitting -> Presenting -> Idle
//!                               |                                      |
//!                               +-------------> Recreating <-----------+
//!                                                   |
//!                                                   v (rebuild failed)
//!                                                 Failed
//! ```
//!
//! One call to [`FrameOrchestrator::tick`] walks the machine once. The slot
//! fence wait is the only backpressure: the CPU never gets more than
//! `frames_in_flight` submissions ahead of the GPU.

use std::sync::Arc;
use std::time::Duration;

use frameloop_core::{PresentationSurface, RendererConfig, SurfaceExtent};
use tracing::{debug, debug_span, error, info, warn};

use crate::backend::{RenderBackend, SurfaceStatus};
use crate::error::FrameError;
use crate::recorder::CommandRecorder;
use crate::recreation::{self, RecreateOutcome, SurfaceResources};
use crate::slots::{SlotId, SlotTracker};
use crate::targets::Acquisition;
use crate::uniforms::{FrameContext, UniformUpdater};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    WaitingForSlot,
    Acquiring,
    Recording,
    Submitting,
    Presenting,
    Recreating,
    /// A rebuild failed. Terminal: later ticks return [`FrameError::Poisoned`].
    Failed,
}

/// What one tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Presented,
    /// Presented, then rebuilt the surface resources (stale or resized).
    PresentedAndRecreated,
    /// Acquisition reported out-of-date; nothing was submitted or presented.
    SkippedOutOfDate,
    /// The window closed while waiting for a visible surface.
    Closed,
}

/// Drives acquire, submit and present, and owns every GPU resource of the
/// frame loop.
///
/// Not thread-safe; it is `Send` only when the backend, recorder and updater
/// are.
pub struct FrameOrchestrator<B, R, U>
where
    B: RenderBackend,
    R: CommandRecorder<B>,
    U: UniformUpdater,
{
    resources: SurfaceResources<B>,
    slots: SlotTracker<B>,
    recorder: R,
    updater: U,
    backend: B,
    config: Arc<RendererConfig>,
    state: FrameState,
    /// Current slot index (0 to frames_in_flight - 1).
    frame_index: usize,
    frame_number: u64,
}

impl<B, R, U> FrameOrchestrator<B, R, U>
where
    B: RenderBackend,
    R: CommandRecorder<B>,
    U: UniformUpdater,
{
    /// Allocates the frame slots and builds the first surface generation.
    ///
    /// If the window is closed before it ever becomes visible, the
    /// orchestrator is returned with nothing built and the next tick reports
    /// [`TickOutcome::Closed`] or retries.
    ///
    /// # Errors
    ///
    /// [`FrameError::ZeroSlots`] when `frames_in_flight` is zero, or any
    /// error from building the first generation.
    pub fn new<S>(
        backend: B,
        recorder: R,
        updater: U,
        config: Arc<RendererConfig>,
        surface: &mut S,
    ) -> Result<Self, FrameError>
    where
        S: PresentationSurface + ?Sized,
    {
        let slots = SlotTracker::new(&backend, config.frames_in_flight)?;

        let mut orchestrator = Self {
            resources: SurfaceResources::new(),
            slots,
            recorder,
            updater,
            backend,
            config,
            state: FrameState::Idle,
            frame_index: 0,
            frame_number: 0,
        };
        orchestrator.recreate(surface)?;

        info!(
            "Frame orchestrator ready: {} frames in flight, generation {}",
            orchestrator.slots.len(),
            orchestrator.resources.generation()
        );
        Ok(orchestrator)
    }

    /// Renders one frame.
    ///
    /// `elapsed` is the time since startup handed to the uniform updater.
    /// On error the state is left at the step that failed.
    pub fn tick<S>(&mut self, surface: &mut S, elapsed: Duration) -> Result<TickOutcome, FrameError>
    where
        S: PresentationSurface + ?Sized,
    {
        self.ensure_usable()?;
        let slot_id = self.slots.acquire_slot(self.frame_index).id();
        let span = debug_span!(
            "tick",
            frame = self.frame_number,
            slot = slot_id.0,
            generation = self.resources.generation()
        );
        let _enter = span.enter();

        self.state = FrameState::WaitingForSlot;
        self.wait_for_slot_fence(slot_id)?;

        self.state = FrameState::Acquiring;
        let acquisition = self.resources.acquire_next(
            &self.backend,
            self.slots.slot(slot_id).image_ready(),
            self.config.acquire_timeout_ns,
        )?;
        let (target, suboptimal) = match acquisition {
            Acquisition::Ready { target, suboptimal } => (target, suboptimal),
            Acquisition::OutOfDate => {
                debug!("Targets out of date at acquire, skipping frame");
                return Ok(match self.recreate(surface)? {
                    RecreateOutcome::Rebuilt { .. } => TickOutcome::SkippedOutOfDate,
                    RecreateOutcome::Closed => TickOutcome::Closed,
                });
            }
        };

        self.state = FrameState::Recording;
        // A different slot's submission may still be reading this target's
        // uniform buffer.
        if let Some(previous) = self.resources.claimant(target)?
            && previous != slot_id
        {
            debug!("{} last claimed by {}, waiting on its fence", target, previous);
            self.wait_for_slot_fence(previous)?;
        }
        self.resources.claim(target, slot_id)?;

        let ctx = FrameContext {
            target,
            elapsed,
            extent: self.resources.extent(),
            frame_number: self.frame_number,
        };
        let bytes = self.updater.uniform_bytes(&ctx);
        self.resources.write_uniforms(&self.backend, target, &bytes)?;

        self.state = FrameState::Submitting;
        let commands = self.resources.command_buffer(target)?;
        let slot = self.slots.slot(slot_id);
        self.backend
            .reset_fence(slot.fence())
            .map_err(|e| FrameError::backend("reset fence", B::error_kind(&e), e))?;
        self.slots.mark_reset(slot_id);

        let slot = self.slots.slot(slot_id);
        self.backend
            .submit(commands, slot.image_ready(), slot.render_done(), slot.fence())
            .map_err(|e| FrameError::backend("submit", B::error_kind(&e), e))?;
        self.slots.mark_submitted(slot_id);

        self.state = FrameState::Presenting;
        let status = self.resources.present(
            &self.backend,
            target,
            self.slots.slot(slot_id).render_done(),
        )?;
        let resized = surface.take_resized();

        self.frame_index = self.slots.advance(self.frame_index);
        self.frame_number += 1;

        if suboptimal || resized || status != SurfaceStatus::Optimal {
            debug!(?status, suboptimal, resized, "Recreating after present");
            return Ok(match self.recreate(surface)? {
                RecreateOutcome::Rebuilt { .. } => TickOutcome::PresentedAndRecreated,
                RecreateOutcome::Closed => TickOutcome::Closed,
            });
        }

        self.state = FrameState::Idle;
        Ok(TickOutcome::Presented)
    }

    /// Rebuilds every surface-dependent resource.
    ///
    /// Called automatically when presentation goes stale; exposed so callers
    /// can force a rebuild.
    ///
    /// A failed rebuild is not retried: the orchestrator moves to
    /// [`FrameState::Failed`] and every later `tick` or `recreate` returns
    /// [`FrameError::Poisoned`]. Dropping it still drains and destroys.
    pub fn recreate<S>(&mut self, surface: &mut S) -> Result<RecreateOutcome, FrameError>
    where
        S: PresentationSurface + ?Sized,
    {
        self.ensure_usable()?;
        self.state = FrameState::Recreating;
        match recreation::recreate(
            &self.backend,
            &mut self.recorder,
            surface,
            &mut self.resources,
            self.updater.uniform_size(),
        ) {
            Ok(outcome) => {
                self.state = FrameState::Idle;
                Ok(outcome)
            }
            Err(e) => {
                error!("Surface rebuild failed, frame loop stopped: {}", e);
                self.state = FrameState::Failed;
                Err(e)
            }
        }
    }

    fn ensure_usable(&self) -> Result<(), FrameError> {
        if self.state == FrameState::Failed {
            return Err(FrameError::Poisoned);
        }
        Ok(())
    }

    fn wait_for_slot_fence(&self, slot_id: SlotId) -> Result<(), FrameError> {
        let slot = self.slots.slot(slot_id);
        if !slot.is_armed() {
            warn!("{} has no pending submit, not waiting on its fence", slot_id);
            return Ok(());
        }
        self.backend
            .wait_for_fence(slot.fence(), self.config.fence_timeout_ns)
            .map_err(|e| FrameError::backend("wait for fence", B::error_kind(&e), e))
    }

    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    #[inline]
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Frames presented so far.
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.resources.generation()
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn slots(&self) -> &SlotTracker<B> {
        &self.slots
    }

    #[inline]
    pub fn extent(&self) -> SurfaceExtent {
        self.resources.extent()
    }

    #[inline]
    pub fn resources(&self) -> &SurfaceResources<B> {
        &self.resources
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn updater_mut(&mut self) -> &mut U {
        &mut self.updater
    }

    #[inline]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }
}

impl<B, R, U> Drop for FrameOrchestrator<B, R, U>
where
    B: RenderBackend,
    R: CommandRecorder<B>,
    U: UniformUpdater,
{
    fn drop(&mut self) {
        if let Err(e) = self.slots.wait_all(&self.backend, self.config.fence_timeout_ns) {
            error!("Failed to wait for frame slots during shutdown: {}", e);
        }
        if let Err(e) = self.backend.wait_idle() {
            error!("Failed to drain the device during shutdown: {}", e);
        }
        self.resources.destroy();
        info!("Frame orchestrator shut down after {} frames", self.frame_number);
    }
}

