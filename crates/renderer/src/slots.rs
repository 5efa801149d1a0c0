//! Frame slots: the fixed set of frames the CPU may queue ahead of the GPU.
//!
//! # Synchronization Flow
//!
//! ```text
//! 1. Wait on the slot fence (CPU waits for the previous use of this slot)
//! 2. Acquire a target (signals image_ready)
//! 3. Submit the target's commands:
//!    - Wait on image_ready
//!    - Signal render_done
//!    - Signal the slot fence
//! 4. Present (waits on render_done)
//! ```
//!
//! Slots are allocated once and reused round-robin. They are independent of
//! the surface and survive every recreation.

use std::fmt;

use tracing::{debug, info, warn};

use crate::backend::RenderBackend;
use crate::error::FrameError;

/// Index of a frame slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub usize);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// Synchronization objects of one frame in flight.
pub struct FrameSlot<B: RenderBackend> {
    id: SlotId,
    image_ready: B::Semaphore,
    render_done: B::Semaphore,
    fence: B::Fence,
    /// False between a fence reset and the submit that will signal it.
    armed: bool,
}

impl<B: RenderBackend> FrameSlot<B> {
    fn new(backend: &B, id: SlotId) -> Result<Self, B::Error> {
        let image_ready = backend.create_semaphore()?;
        let render_done = backend.create_semaphore()?;
        // Signaled so the first wait on a fresh slot returns immediately.
        let fence = backend.create_fence(true)?;
        Ok(Self {
            id,
            image_ready,
            render_done,
            fence,
            armed: true,
        })
    }

    #[inline]
    pub fn id(&self) -> SlotId {
        self.id
    }

    #[inline]
    pub fn image_ready(&self) -> &B::Semaphore {
        &self.image_ready
    }

    #[inline]
    pub fn render_done(&self) -> &B::Semaphore {
        &self.render_done
    }

    #[inline]
    pub fn fence(&self) -> &B::Fence {
        &self.fence
    }

    /// Whether the fence will signal: false after a reset whose submit failed.
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

pub struct SlotTracker<B: RenderBackend> {
    slots: Vec<FrameSlot<B>>,
}

impl<B: RenderBackend> SlotTracker<B> {
    /// Allocates `count` slots.
    ///
    /// # Errors
    ///
    /// [`FrameError::ZeroSlots`] when `count` is zero, or a backend error if
    /// a semaphore or fence cannot be created.
    pub fn new(backend: &B, count: usize) -> Result<Self, FrameError> {
        if count == 0 {
            return Err(FrameError::ZeroSlots);
        }

        let mut slots = Vec::with_capacity(count);
        for i in 0..count {
            let slot = FrameSlot::new(backend, SlotId(i)).map_err(|e| {
                FrameError::backend("create frame slot", B::error_kind(&e), e)
            })?;
            debug!("Created frame slot {}", i);
            slots.push(slot);
        }

        info!("Slot tracker created with {} frames in flight", count);
        Ok(Self { slots })
    }

    /// The slot used for `frame_index`. Never fails; the index wraps.
    #[inline]
    pub fn acquire_slot(&self, frame_index: usize) -> &FrameSlot<B> {
        &self.slots[frame_index % self.slots.len()]
    }

    #[inline]
    pub fn slot(&self, id: SlotId) -> &FrameSlot<B> {
        &self.slots[id.0 % self.slots.len()]
    }

    /// The frame index following `frame_index`.
    #[inline]
    pub fn advance(&self, frame_index: usize) -> usize {
        advance(frame_index, self.slots.len())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn mark_reset(&mut self, id: SlotId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.armed = false;
        }
    }

    pub(crate) fn mark_submitted(&mut self, id: SlotId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.armed = true;
        }
    }

    /// Waits on every slot fence.
    ///
    /// A fence that was reset for a submit that never happened would never
    /// signal, so it is skipped.
    pub fn wait_all(&self, backend: &B, timeout_ns: u64) -> Result<(), FrameError> {
        for slot in &self.slots {
            if !slot.armed {
                warn!("Skipping wait on {}: its fence was reset but never submitted", slot.id);
                continue;
            }
            backend
                .wait_for_fence(&slot.fence, timeout_ns)
                .map_err(|e| FrameError::backend("wait for fence", B::error_kind(&e), e))?;
        }
        Ok(())
    }
}

#[inline]
pub(crate) fn advance(frame_index: usize, slot_count: usize) -> usize {
    (frame_index + 1) % slot_count
}
