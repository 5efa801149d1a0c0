//! Frame orchestration for frameloop.
//!
//! This crate owns the per-frame presentation loop:
//! - Frame slots (frames in flight) and their synchronization objects
//! - The presentable target set with its generation-checked claim table
//! - The per-tick state machine: wait, acquire, record, submit, present
//! - The recreation protocol that rebuilds surface-dependent resources
//!
//! The core only talks to the GPU through [`RenderBackend`] and to the window
//! through [`PresentationSurface`](frameloop_core::PresentationSurface). The
//! [`vulkan`] module implements the backend on top of `frameloop-rhi`, and
//! [`Renderer`] wires it to a real window.

pub mod backend;
pub mod error;
pub mod orchestrator;
pub mod recorder;
pub mod recreation;
pub mod renderer;
pub mod slots;
pub mod targets;
pub mod uniforms;
pub mod vulkan;

pub use backend::{Acquired, PresentTargets, RenderBackend, SurfaceStatus};
pub use error::{ErrorKind, FrameError, RecreationStage};
pub use orchestrator::{FrameOrchestrator, FrameState, TickOutcome};
pub use recorder::{CommandRecorder, RecordContext};
pub use recreation::{RecreateOutcome, SurfaceResources};
pub use renderer::{Renderer, RendererError, SceneOrchestrator};
pub use slots::{FrameSlot, SlotId, SlotTracker};
pub use targets::{Acquisition, SurfaceSet, TargetHandle};
pub use uniforms::{FrameContext, UniformUpdater};
