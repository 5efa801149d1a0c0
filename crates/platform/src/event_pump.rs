//! Event pumping for a render loop that owns the thread.
//!
//! The renderer drives its own loop, so winit is pumped from it rather than
//! the other way round: [`EventPump::poll_events`] drains pending events
//! between frames and [`PresentationSurface::wait_events`] blocks on the
//! platform queue while the window is minimized.

use std::time::Duration;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{WindowAttributes, WindowId};

use frameloop_core::{Error, PresentationSurface, RendererConfig, ResizeFlag, Result, SurfaceExtent};

use crate::window::Window;

/// Event-handler half of the pump. Receives winit callbacks.
struct WindowState {
    attributes: WindowAttributes,
    window: Option<Window>,
    creation_error: Option<Error>,
    resized: ResizeFlag,
    close_requested: bool,
}

impl WindowState {
    fn new(attributes: WindowAttributes) -> Self {
        Self {
            attributes,
            window: None,
            creation_error: None,
            resized: ResizeFlag::new(),
            close_requested: false,
        }
    }

    fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                tracing::debug!("Window resized: {}x{}", size.width, size.height);
                self.resized.raise();
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                tracing::debug!("Scale factor changed: {}", scale_factor);
                self.resized.raise();
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match Window::new(event_loop, self.attributes.clone()) {
            Ok(window) => self.window = Some(window),
            Err(e) => self.creation_error = Some(e),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.handle_window_event(&event);
    }
}

/// Owns the winit event loop and the application window.
pub struct EventPump {
    event_loop: EventLoop<()>,
    state: WindowState,
}

impl EventPump {
    /// Creates the event loop and pumps it until the window exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the event loop or window cannot be
    /// created, or the loop exits before a window appears.
    pub fn new(config: &RendererConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;
        let mut state = WindowState::new(Window::attributes(config));

        // Windows are created from the first `resumed` callback.
        while state.window.is_none() {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::ZERO), &mut state)
            {
                return Err(Error::Window(format!(
                    "Event loop exited with code {} before the window was created",
                    code
                )));
            }
            if let Some(e) = state.creation_error.take() {
                return Err(e);
            }
        }

        Ok(Self { event_loop, state })
    }

    /// The application window.
    pub fn window(&self) -> Option<&Window> {
        self.state.window.as_ref()
    }

    /// Handle for raising resize notifications from elsewhere.
    pub fn resize_flag(&self) -> ResizeFlag {
        self.state.resized.clone()
    }

    /// Dispatches every pending event without blocking.
    pub fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            tracing::info!("Event loop exited with code {}", code);
            self.state.close_requested = true;
        }
    }
}

impl PresentationSurface for EventPump {
    fn extent(&self) -> SurfaceExtent {
        self.state
            .window
            .as_ref()
            .map(Window::extent)
            .unwrap_or_default()
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn take_resized(&mut self) -> bool {
        self.state.resized.take()
    }

    fn close_requested(&self) -> bool {
        self.state.close_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalSize;

    #[test]
    fn test_resize_event_raises_flag() {
        let mut state = WindowState::new(WindowAttributes::default());
        let flag = state.resized.clone();

        state.handle_window_event(&WindowEvent::Resized(PhysicalSize::new(400, 300)));
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn test_close_event_sets_close_requested() {
        let mut state = WindowState::new(WindowAttributes::default());
        assert!(!state.close_requested);

        state.handle_window_event(&WindowEvent::CloseRequested);
        assert!(state.close_requested);
        assert!(!state.resized.is_raised());
    }
}
