//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Surface query or creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain creation error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Shader loading error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Pipeline description incomplete
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Invalid argument passed to a wrapper
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error while reading shader binaries
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RhiError {
    /// Whether the error is a host or device memory exhaustion.
    pub fn is_out_of_memory(&self) -> bool {
        match self {
            RhiError::VulkanError(result) => matches!(
                *result,
                vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            ),
            RhiError::AllocatorError(gpu_allocator::AllocationError::OutOfMemory) => true,
            _ => false,
        }
    }

    /// Whether the logical device was lost.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_memory_classification() {
        assert!(RhiError::from(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY).is_out_of_memory());
        assert!(RhiError::from(gpu_allocator::AllocationError::OutOfMemory).is_out_of_memory());
        assert!(!RhiError::from(vk::Result::ERROR_DEVICE_LOST).is_out_of_memory());
        assert!(RhiError::from(vk::Result::ERROR_DEVICE_LOST).is_device_lost());
    }
}
