//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the global tracing subscriber.
///
/// Filtering follows `RUST_LOG` when set; otherwise frameloop crates log at
/// debug level and everything else at info.
///
/// # Example
/// ```
/// frameloop_core::init_logging();
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,frameloop=debug,winit=warn"));

    // A second call (e.g. from several doctests in one process) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
