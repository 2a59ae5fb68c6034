use super::SpeedState;

/// Source material is treated as 30 fps; one frame at 1x lasts 1/30 s.
pub const NOMINAL_FPS: f64 = 30.0;

const NOMINAL_FRAME_SECS: f64 = 1.0 / NOMINAL_FPS;

/// When the playback position last jumped, in monotonic milliseconds.
///
/// Written only by [`maybe_advance`].
#[derive(Debug, Clone, Default)]
pub struct FrameTiming {
    last_advance_ms: f64,
}

impl FrameTiming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_advance_ms(&self) -> f64 {
        self.last_advance_ms
    }
}

/// Decide whether the playback position may jump, and by how much.
///
/// The gate interval is one nominal frame at the faster region's speed, so a
/// sped-up region is never under-sampled. The jump distance is one nominal
/// frame scaled by the mask-weighted dominant speed. The two are deliberately
/// decoupled: how often we may jump tracks the fastest region, how far we
/// jump tracks whichever region dominates the frame.
///
/// Returns the jump in seconds and stamps `timing` when the gate opens.
pub fn maybe_advance(
    now_ms: f64,
    timing: &mut FrameTiming,
    speeds: &SpeedState,
    dominant_speed: f32,
) -> Option<f64> {
    let fg_interval = NOMINAL_FRAME_SECS / speeds.foreground_speed() as f64;
    let bg_interval = NOMINAL_FRAME_SECS / speeds.background_speed() as f64;
    let gate_ms = fg_interval.min(bg_interval) * 1000.0;

    if now_ms - timing.last_advance_ms < gate_ms {
        return None;
    }

    timing.last_advance_ms = now_ms;
    Some(NOMINAL_FRAME_SECS * dominant_speed as f64)
}
