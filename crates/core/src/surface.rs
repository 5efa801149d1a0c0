//! Window-side view of the presentation surface.
//!
//! The frame loop never talks to the windowing system directly. It polls a
//! [`PresentationSurface`] for the current drawable size, resize and close
//! requests, and asks it to block on the platform event queue while the
//! window is minimized.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Drawable size of a surface in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SurfaceExtent {
    pub width: u32,
    pub height: u32,
}

impl SurfaceExtent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero, e.g. a minimized window.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height; 1.0 for an empty extent.
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl fmt::Display for SurfaceExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A window (or anything window-like) the renderer presents into.
///
/// All queries are polled by the render thread; implementations never call
/// back into the renderer.
pub trait PresentationSurface {
    /// Current drawable size. May be empty while minimized.
    fn extent(&self) -> SurfaceExtent;

    /// Blocks until at least one platform event has been processed.
    ///
    /// Used while the extent is empty so the render thread sleeps instead of
    /// spinning.
    fn wait_events(&mut self);

    /// Returns and clears the pending resize notification.
    fn take_resized(&mut self) -> bool;

    /// Whether the user asked to close the window.
    fn close_requested(&self) -> bool;
}

/// Resize notification shared between the event source and the render loop.
///
/// Any thread may [`raise`](Self::raise) it; the render thread consumes it
/// with [`take`](Self::take).
#[derive(Clone, Debug, Default)]
pub struct ResizeFlag(Arc<AtomicBool>);

impl ResizeFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns whether the flag was raised and clears it.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_extent() {
        assert!(SurfaceExtent::new(0, 600).is_empty());
        assert!(SurfaceExtent::new(800, 0).is_empty());
        assert!(!SurfaceExtent::new(800, 600).is_empty());
    }

    #[test]
    fn test_aspect_ratio() {
        approx::assert_relative_eq!(SurfaceExtent::new(800, 400).aspect_ratio(), 2.0);
        approx::assert_relative_eq!(SurfaceExtent::default().aspect_ratio(), 1.0);
    }

    #[test]
    fn test_resize_flag_take_clears() {
        let flag = ResizeFlag::new();
        let remote = flag.clone();
        assert!(!flag.take());

        remote.raise();
        assert!(flag.is_raised());
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn test_resize_flag_raised_from_other_thread() {
        let flag = ResizeFlag::new();
        let remote = flag.clone();
        std::thread::spawn(move || remote.raise())
            .join()
            .unwrap();
        assert!(flag.take());
    }
}
