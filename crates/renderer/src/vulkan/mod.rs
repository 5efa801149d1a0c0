//! Vulkan implementation of the frame-loop seams.

mod backend;
mod recorder;

pub use backend::{
    Framebuffer, MODEL_INDEX_PUSH_SIZE, PipelineFormats, RenderAttachments, ResolveSource,
    UniformDescriptors, VulkanBackend,
};
pub use recorder::SceneRecorder;
