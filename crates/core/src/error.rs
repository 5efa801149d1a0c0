//! Error types shared by the platform and application layers.

use thiserror::Error;

/// Error type for everything outside the GPU abstraction.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or event loop errors
    #[error("Window error: {0}")]
    Window(String),

    /// Vulkan surface creation errors raised from the platform layer
    #[error("Surface error: {0}")]
    Surface(String),

    /// Invalid renderer configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the core [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
