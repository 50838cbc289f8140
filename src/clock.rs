// Frame-rate independent animation time.
// Elapsed wall time is expressed in 60 Hz frames and clamped so stalls never cause a visible jump.

/// Baseline frame interval in milliseconds.
pub const FRAME_MS: f64 = 1000.0 / 60.0;
pub const MIN_STEP: f64 = 0.2;
pub const MAX_STEP: f64 = 5.0;
/// Frames to seconds, for shader-style time.
pub const SECONDS_PER_FRAME: f64 = 0.016667;

/// Accumulated animation time at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Frame counter.
    pub t: f64,
    /// Speed-scaled frame counter.
    pub t2: f64,
}

impl FrameTime {
    pub fn seconds(&self) -> f64 {
        self.t2 * SECONDS_PER_FRAME
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    time: FrameTime,
    prev_now: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        FrameClock::default()
    }

    /// Advance to `now_ms`. The first call only records the timestamp.
    pub fn advance(&mut self, now_ms: f64, speed: Option<f64>) -> FrameTime {
        if let Some(prev) = self.prev_now {
            let elapsed = normalized_step(now_ms - prev);
            let speed = speed.filter(|s| *s != 0.0 && s.is_finite()).unwrap_or(1.0);
            self.time.t += elapsed;
            self.time.t2 += speed * elapsed;
        }
        self.prev_now = Some(now_ms);
        self.time
    }

    pub fn time(&self) -> FrameTime {
        self.time
    }
}

/// Milliseconds to clamped 60 Hz frame units.
pub fn normalized_step(delta_ms: f64) -> f64 {
    let frames = delta_ms / FRAME_MS;
    if frames.is_nan() {
        return MIN_STEP;
    }
    frames.clamp(MIN_STEP, MAX_STEP)
}
