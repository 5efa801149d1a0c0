//! Frame timing.

use std::thread;
use std::time::{Duration, Instant};

/// Per-frame timer with an optional frame-rate cap.
///
/// Call [`FrameTimer::tick`] once per rendered frame. When a cap is set the
/// tick sleeps for whatever remains of the frame budget before measuring.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    delta: Duration,
    max_fps: u32,
    frame_count: u64,
}

impl FrameTimer {
    /// Create a new uncapped timer, starting from now.
    pub fn new() -> Self {
        Self::with_max_fps(0)
    }

    /// Create a timer capped at `max_fps` frames per second (0 = uncapped).
    pub fn with_max_fps(max_fps: u32) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            delta: Duration::ZERO,
            max_fps,
            frame_count: 0,
        }
    }

    /// Marks the end of a frame and returns the time since the previous tick.
    pub fn tick(&mut self) -> Duration {
        let mut now = Instant::now();
        if let Some(budget) = self.frame_budget() {
            let spent = now - self.last_tick;
            if spent < budget {
                thread::sleep(budget - spent);
                now = Instant::now();
            }
        }

        self.delta = now - self.last_tick;
        self.last_tick = now;
        self.frame_count += 1;
        self.delta
    }

    /// Total time since the timer was created or reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Total time in seconds since the timer was created or reset.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Duration of the last completed frame.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Frames per second derived from the last delta, rounded.
    pub fn fps(&self) -> u32 {
        if self.delta.is_zero() {
            0
        } else {
            (1.0 / self.delta.as_secs_f64()).round() as u32
        }
    }

    /// Number of ticks since creation or reset.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn max_fps(&self) -> u32 {
        self.max_fps
    }

    pub fn set_max_fps(&mut self, max_fps: u32) {
        self.max_fps = max_fps;
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
        self.delta = Duration::ZERO;
        self.frame_count = 0;
    }

    fn frame_budget(&self) -> Option<Duration> {
        (self.max_fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(self.max_fps)))
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let mut timer = FrameTimer::new();
        timer.tick();
        timer.tick();
        assert_eq!(timer.frame_count(), 2);
    }

    #[test]
    fn test_cap_enforces_minimum_frame_time() {
        let mut timer = FrameTimer::with_max_fps(100);
        let delta = timer.tick();
        assert!(delta >= Duration::from_millis(10));
        assert!(timer.fps() <= 100);
    }

    #[test]
    fn test_fps_zero_before_first_tick() {
        let timer = FrameTimer::new();
        assert_eq!(timer.fps(), 0);
    }

    #[test]
    fn test_reset_clears_frame_count() {
        let mut timer = FrameTimer::new();
        timer.tick();
        timer.reset();
        assert_eq!(timer.frame_count(), 0);
        assert_eq!(timer.delta(), Duration::ZERO);
    }
}
