use std::time::Instant;

use tracing::info;

/// Number of presented frames per FPS sample.
pub const FPS_WINDOW: u32 = 100;

/// Rolling frame counter; observability only.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: u32,
    frames: u32,
    started: Option<Instant>,
    last: Option<f64>,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(FPS_WINDOW)
    }
}

impl FpsCounter {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            frames: 0,
            started: None,
            last: None,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.frames = 0;
        self.started = Some(now);
    }

    /// Most recently completed sample.
    pub fn last(&self) -> Option<f64> {
        self.last
    }

    /// Counts one presented frame; returns a fresh sample when a window closes.
    pub fn record(&mut self, now: Instant) -> Option<f64> {
        let started = *self.started.get_or_insert(now);
        self.frames += 1;
        if self.frames < self.window {
            return None;
        }

        let elapsed = now.saturating_duration_since(started).as_secs_f64();
        let fps = if elapsed > 0.0 {
            f64::from(self.frames) / elapsed
        } else {
            f64::INFINITY
        };
        info!(fps = format_args!("{fps:.1}"), "render rate");
        self.frames = 0;
        self.started = Some(now);
        self.last = Some(fps);
        Some(fps)
    }
}
