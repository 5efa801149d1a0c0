//! The presentable surface set.
//!
//! A [`SurfaceSet`] wraps one generation of backend targets together with
//! the claim table: for each target, the slot whose fence last covered a
//! submission rendering into it. Sets are never mutated in place; recreation
//! builds a new one with the next generation and an empty claim table.

use std::fmt;

use frameloop_core::SurfaceExtent;

use crate::backend::{PresentTargets, RenderBackend, SurfaceStatus};
use crate::error::FrameError;
use crate::slots::SlotId;

/// Names one target of one surface generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetHandle {
    index: u32,
    generation: u64,
}

impl TargetHandle {
    pub const fn new(index: u32, generation: u64) -> Self {
        Self { index, generation }
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@gen{}", self.index, self.generation)
    }
}

/// Outcome of [`SurfaceSet::acquire_next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquisition {
    Ready {
        target: TargetHandle,
        suboptimal: bool,
    },
    /// Nothing was acquired; the set must be rebuilt.
    OutOfDate,
}

pub struct SurfaceSet<T> {
    targets: T,
    generation: u64,
    claims: Vec<Option<SlotId>>,
}

impl<T: PresentTargets> SurfaceSet<T> {
    pub fn new(targets: T, generation: u64) -> Self {
        let claims = vec![None; targets.len()];
        Self {
            targets,
            generation,
            claims,
        }
    }

    #[inline]
    pub fn targets(&self) -> &T {
        &self.targets
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[inline]
    pub fn extent(&self) -> SurfaceExtent {
        self.targets.extent()
    }

    /// Handles for every target, in order.
    pub fn handles(&self) -> impl Iterator<Item = TargetHandle> + '_ {
        (0..self.len() as u32).map(|index| TargetHandle::new(index, self.generation))
    }

    /// Checks that `handle` belongs to this generation and is in range.
    pub fn validate(&self, handle: TargetHandle) -> Result<usize, FrameError> {
        let index = handle.index as usize;
        if handle.generation != self.generation || index >= self.claims.len() {
            return Err(FrameError::StaleTarget {
                handle,
                current: self.generation,
            });
        }
        Ok(index)
    }

    /// Acquires the next target from the backend.
    pub fn acquire_next<B>(
        &self,
        backend: &B,
        ready: &B::Semaphore,
        timeout_ns: u64,
    ) -> Result<Acquisition, FrameError>
    where
        B: RenderBackend<Targets = T>,
    {
        let acquired = backend
            .acquire_next(&self.targets, ready, timeout_ns)
            .map_err(|e| FrameError::backend("acquire", B::error_kind(&e), e))?;

        let suboptimal = match acquired.status {
            SurfaceStatus::OutOfDate => return Ok(Acquisition::OutOfDate),
            SurfaceStatus::Suboptimal => true,
            SurfaceStatus::Optimal => false,
        };
        let target = TargetHandle::new(acquired.index, self.generation);
        self.validate(target)?;
        Ok(Acquisition::Ready { target, suboptimal })
    }

    /// The slot that last claimed `handle`, if any.
    pub fn claimant(&self, handle: TargetHandle) -> Result<Option<SlotId>, FrameError> {
        let index = self.validate(handle)?;
        Ok(self.claims[index])
    }

    /// Records `slot` as the claimant of `handle`, returning the previous one.
    pub fn claim(&mut self, handle: TargetHandle, slot: SlotId) -> Result<Option<SlotId>, FrameError> {
        let index = self.validate(handle)?;
        Ok(self.claims[index].replace(slot))
    }
}
