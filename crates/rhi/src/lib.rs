//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate wraps the parts of Vulkan the frame loop needs behind RAII types
//! built on `ash`:
//! - Instance, physical device selection and logical device
//! - Swapchain creation, acquisition and presentation
//! - Semaphores and fences
//! - Command pools and command buffers
//! - Host-visible buffers, depth images and descriptor sets
//! - Shader modules and graphics pipelines (dynamic rendering)

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
