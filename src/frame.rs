use std::time::{Duration, Instant};

const FPS_UPDATE_INTERVAL: f32 = 1.0;

/// Frame metadata - carries frame number and timing info
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub number: u64,
    pub time: f32,
    pub delta: f32,
}

impl FrameInfo {
    pub fn new(number: u64, time: f32, delta: f32) -> Self {
        Self { number, time, delta }
    }
}

/// Where frame deltas come from
enum Source {
    Wall { start: Instant, last: Instant },
    /// Every frame advances by the same step, for reproducible headless runs
    Fixed { step: f32 },
}

/// Infinite iterator that yields frame information
/// Use this in a loop: `for frame in frames.take(n) { ... }`
pub struct FrameIterator {
    frame_number: u64,
    time: f32,
    source: Source,
}

impl FrameIterator {
    /// Frames timed by the wall clock
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            frame_number: 0,
            time: 0.0,
            source: Source::Wall { start: now, last: now },
        }
    }

    /// Frames spaced exactly `step` apart
    pub fn fixed(step: Duration) -> Self {
        Self {
            frame_number: 0,
            time: 0.0,
            source: Source::Fixed {
                step: step.as_secs_f32(),
            },
        }
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

impl Default for FrameIterator {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for FrameIterator {
    type Item = FrameInfo;

    fn next(&mut self) -> Option<FrameInfo> {
        let delta = match &mut self.source {
            Source::Wall { start, last } => {
                let now = Instant::now();
                let delta = now.duration_since(*last).as_secs_f32();
                *last = now;
                self.time = now.duration_since(*start).as_secs_f32();
                delta
            }
            Source::Fixed { step } => {
                self.time += *step;
                *step
            }
        };

        let info = FrameInfo::new(self.frame_number, self.time, delta);
        self.frame_number += 1;
        Some(info)
    }
}

/// Frames-per-second averaged over roughly one second
#[derive(Debug, Default)]
pub struct FpsCounter {
    frame_count: u32,
    timer: f32,
    fps: f32,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one frame; returns the new average when one is ready
    pub fn tick(&mut self, delta: f32) -> Option<f32> {
        self.frame_count += 1;
        self.timer += delta;

        if self.timer < FPS_UPDATE_INTERVAL {
            return None;
        }

        self.fps = self.frame_count as f32 / self.timer;
        self.frame_count = 0;
        self.timer = 0.0;
        Some(self.fps)
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}
