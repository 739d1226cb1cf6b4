// This is free and unencumbered software released into the public domain.

use std::time::{Duration, Instant};

pub const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Counts frames and publishes the count at most once per [`FPS_WINDOW`].
#[derive(Clone, Debug)]
pub struct FpsCounter {
    frame_count: u32,
    last_reset: Instant,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            last_reset: now,
        }
    }

    /// Records one frame. Returns the frames counted since the previous
    /// publish once a full window has elapsed, and starts a new window.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        self.frame_count += 1;
        if now.saturating_duration_since(self.last_reset) >= FPS_WINDOW {
            let fps = self.frame_count;
            self.frame_count = 0;
            self.last_reset = now;
            return Some(fps);
        }
        None
    }
}

pub fn fps_text(fps: u32) -> String {
    format!("FPS: {fps}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_once_per_second() {
        let t0 = Instant::now();
        let mut counter = FpsCounter::new(t0);
        for i in 1..30 {
            assert_eq!(counter.tick(t0 + Duration::from_millis(i * 33)), None);
        }
        assert_eq!(counter.tick(t0 + Duration::from_millis(1000)), Some(30));
        assert_eq!(counter.tick(t0 + Duration::from_millis(1500)), None);
        assert_eq!(counter.tick(t0 + Duration::from_millis(2000)), Some(2));
    }

    #[test]
    fn a_slow_first_frame_publishes_immediately() {
        let t0 = Instant::now();
        let mut counter = FpsCounter::new(t0);
        assert_eq!(counter.tick(t0 + Duration::from_secs(3)), Some(1));
    }

    #[test]
    fn text_matches_the_readout_format() {
        assert_eq!(fps_text(24), "FPS: 24");
    }
}
