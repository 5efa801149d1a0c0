//! Platform layer for frameloop.
//!
//! - Window creation via winit
//! - Vulkan surface creation and the instance extensions it needs
//! - An [`EventPump`] that implements
//!   [`PresentationSurface`](frameloop_core::PresentationSurface) for the
//!   render loop

mod event_pump;
mod window;

pub use event_pump::EventPump;
pub use window::{Surface, Window};
