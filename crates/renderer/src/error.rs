//! Frame-loop error taxonomy.
//!
//! Transient surface conditions (out-of-date, suboptimal) are
//! [`SurfaceStatus`](crate::backend::SurfaceStatus) values and never show up
//! here. Everything in [`FrameError`] is fatal to the frame loop.

use std::fmt;

use thiserror::Error;

use crate::targets::TargetHandle;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad class of a failure, used to decide how loudly to report it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Host or device memory ran out.
    ResourceExhaustion,
    /// The caller broke an API contract (bad configuration, stale handle).
    ContractViolation,
    /// The device, driver or surface failed.
    Device,
}

/// Step of the recreation protocol that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecreationStage {
    Drain,
    Requirements,
    Targets,
    Attachments,
    Pipeline,
    Framebuffers,
    UniformBuffers,
    Descriptors,
    CommandBuffers,
}

impl fmt::Display for RecreationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Drain => "drain",
            Self::Requirements => "pipeline requirements",
            Self::Targets => "target set",
            Self::Attachments => "attachments",
            Self::Pipeline => "pipeline",
            Self::Framebuffers => "framebuffers",
            Self::UniformBuffers => "uniform buffers",
            Self::Descriptors => "descriptors",
            Self::CommandBuffers => "command buffers",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum FrameError {
    /// A backend call on the per-frame path failed.
    #[error("{op} failed: {source}")]
    Backend {
        op: &'static str,
        kind: ErrorKind,
        #[source]
        source: BoxedSource,
    },

    /// Creating a dependent resource failed while rebuilding.
    #[error("recreation failed at {stage}: {source}")]
    Recreation {
        stage: RecreationStage,
        kind: ErrorKind,
        #[source]
        source: BoxedSource,
    },

    /// A target handle or command buffer from a superseded generation was used.
    #[error("stale target {handle} (current generation {current})")]
    StaleTarget { handle: TargetHandle, current: u64 },

    /// The configuration asked for zero frames in flight.
    #[error("at least one frame slot is required")]
    ZeroSlots,

    /// An earlier rebuild failed; the frame loop cannot continue.
    #[error("frame loop stopped after a failed rebuild")]
    Poisoned,
}

impl FrameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend { kind, .. } | Self::Recreation { kind, .. } => *kind,
            Self::StaleTarget { .. } | Self::ZeroSlots | Self::Poisoned => {
                ErrorKind::ContractViolation
            }
        }
    }

    pub(crate) fn backend<E>(op: &'static str, kind: ErrorKind, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            op,
            kind,
            source: Box::new(source),
        }
    }

    pub(crate) fn recreation<E>(stage: RecreationStage, kind: ErrorKind, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Recreation {
            stage,
            kind,
            source: Box::new(source),
        }
    }
}
