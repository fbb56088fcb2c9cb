use std::time::{Duration, Instant};

/// Snapshot taken when a frame finishes.
#[derive(Debug, Copy, Clone)]
pub struct FrameTick {
    /// Time since the previous tick, after any pacing sleep.
    pub dt: Duration,

    /// Monotonic frame counter, starting at 0.
    pub frame_index: u64,
}

/// Caps the render loop at a maximum frame rate.
///
/// The loop redraws unconditionally; without vsync it would spin a core.
/// With `min_interval == None` pacing is disabled and `pace` only counts.
#[derive(Debug, Clone)]
pub struct FramePacer {
    last: Instant,
    frame_index: u64,
    min_interval: Option<Duration>,
}

impl FramePacer {
    pub fn new(max_fps: Option<u32>) -> Self {
        let min_interval = max_fps
            .filter(|fps| *fps > 0)
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)));

        Self {
            last: Instant::now(),
            frame_index: 0,
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    /// Sleeps out the remainder of the frame budget and returns the tick.
    pub fn pace(&mut self) -> FrameTick {
        if let Some(budget) = self.min_interval {
            let spent = self.last.elapsed();
            if spent < budget {
                std::thread::sleep(budget - spent);
            }
        }

        let now = Instant::now();
        let tick = FrameTick {
            dt: now.saturating_duration_since(self.last),
            frame_index: self.frame_index,
        };

        self.last = now;
        self.frame_index = self.frame_index.wrapping_add(1);
        tick
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(None)
    }
}
