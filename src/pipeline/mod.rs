use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::anyhow;

use crate::display::{overlay, DisplaySink};
use crate::effects::apply_speed_effects;
use crate::error::PipelineError;
use crate::playback::FrameSource;
use crate::segmentation::{SegmentOptions, Segmenter};
use crate::tempo::{dominant_speed, maybe_advance, FrameTiming, Region, SpeedState, NOMINAL_FPS};

/// Host-issued mutations, applied only at loop drain points so shared state
/// is never touched mid-cycle.
#[derive(Debug, Clone, Copy)]
pub enum Command {
    SetSpeed(Region, f32),
    SelectRegion(Region),
    SetSelectedSpeed(f32),
    SetDebugOverlay(bool),
    Stop,
}

/// Cloneable handle for driving a running loop from the host side.
///
/// Speed preconditions are checked here, synchronously, before anything is
/// queued; the loop never sees an invalid value from a handle.
#[derive(Clone)]
pub struct PipelineHandle {
    commands: Sender<Command>,
}

impl PipelineHandle {
    pub fn set_speed(&self, region: Region, value: f32) -> Result<(), PipelineError> {
        if !(value > 0.0) {
            return Err(PipelineError::InvalidSpeed { value });
        }
        let _ = self.commands.send(Command::SetSpeed(region, value));
        Ok(())
    }

    pub fn select_region(&self, region: Region) {
        let _ = self.commands.send(Command::SelectRegion(region));
    }

    pub fn set_selected_speed(&self, value: f32) -> Result<(), PipelineError> {
        if !(value > 0.0) {
            return Err(PipelineError::InvalidSpeed { value });
        }
        let _ = self.commands.send(Command::SetSelectedSpeed(value));
        Ok(())
    }

    pub fn set_debug_overlay(&self, enabled: bool) {
        let _ = self.commands.send(Command::SetDebugOverlay(enabled));
    }

    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }
}

/// Monotonic millisecond clock behind the frame loop, swappable in tests.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Wall clock measured from construction.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Running,
}

#[derive(Default)]
struct LoopStats {
    frames: u64,
    total_decode: Duration,
    total_segment: Duration,
    total_present: Duration,
}

impl LoopStats {
    fn record(&mut self, decode: Duration, segment: Duration, present: Duration, dominant: f32) {
        self.frames += 1;
        self.total_decode += decode;
        self.total_segment += segment;
        self.total_present += present;

        if self.frames % 30 == 0 {
            let frames = self.frames as f64;
            let avg_decode_ms = self.total_decode.as_secs_f64() * 1000.0 / frames;
            let avg_segment_ms = self.total_segment.as_secs_f64() * 1000.0 / frames;
            let avg_present_ms = self.total_present.as_secs_f64() * 1000.0 / frames;
            let total_ms = avg_decode_ms + avg_segment_ms + avg_present_ms;

            tracing::info!(
                "Frame {}: decode={:.1}ms, segment={:.1}ms, present={:.1}ms, total={:.1}ms, fps={:.1}, dominant={:.2}x",
                self.frames,
                avg_decode_ms,
                avg_segment_ms,
                avg_present_ms,
                total_ms,
                1000.0 / total_ms,
                dominant
            );
        }
    }
}

/// Per-frame processing loop.
///
/// A two-state machine (Idle/Running) over four collaborator seams. Each
/// cycle decodes the frame at the current playback position, asks the
/// segmenter for a mask, applies the speed effects, presents the result, and
/// lets the time advancer move the playback position. Host commands arrive
/// over a channel and are drained only between cycles and when a
/// segmentation request returns, so at most one request is ever outstanding
/// and a stop is never observed mid-mutation.
pub struct FrameLoop<S, F, D, C> {
    segmenter: S,
    source: F,
    sink: D,
    clock: C,
    options: SegmentOptions,
    speeds: SpeedState,
    timing: FrameTiming,
    state: SessionState,
    position_secs: f64,
    debug_overlay: bool,
    dimensions: (u32, u32),
    commands: Receiver<Command>,
    command_sender: Sender<Command>,
    last_fault: Option<PipelineError>,
    stats: LoopStats,
}

impl<S, F, D, C> FrameLoop<S, F, D, C>
where
    S: Segmenter,
    F: FrameSource,
    D: DisplaySink,
    C: Clock,
{
    pub fn new(segmenter: S, source: F, sink: D, clock: C, options: SegmentOptions) -> Self {
        let (command_sender, commands) = channel();
        Self {
            segmenter,
            source,
            sink,
            clock,
            options,
            speeds: SpeedState::default(),
            timing: FrameTiming::new(),
            state: SessionState::Idle,
            position_secs: 0.0,
            debug_overlay: false,
            dimensions: (0, 0),
            commands,
            command_sender,
            last_fault: None,
            stats: LoopStats::default(),
        }
    }

    /// Handle for mutating the loop from another thread while it runs.
    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            commands: self.command_sender.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn position_secs(&self) -> f64 {
        self.position_secs
    }

    pub fn speeds(&self) -> &SpeedState {
        &self.speeds
    }

    /// The fault that halted the last session, if any.
    pub fn last_fault(&self) -> Option<&PipelineError> {
        self.last_fault.as_ref()
    }

    /// Set a region speed directly (same-thread host interface).
    pub fn set_speed(&mut self, region: Region, value: f32) -> Result<(), PipelineError> {
        self.speeds.set_speed(region, value)
    }

    pub fn set_debug_overlay(&mut self, enabled: bool) {
        self.debug_overlay = enabled;
    }

    /// Transition Idle -> Running and capture the source dimensions.
    ///
    /// A second `start` while Running is a no-op: it must not arm a second
    /// concurrent cycle and leaves timing and position untouched.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.state == SessionState::Running {
            tracing::debug!("start() while running ignored");
            return Ok(());
        }

        let (width, height) = self.source.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::EmptySource { width, height });
        }

        self.dimensions = (width, height);
        self.last_fault = None;
        self.state = SessionState::Running;
        tracing::info!("Processing started at {}x{}", width, height);
        Ok(())
    }

    /// Transition Running -> Idle.
    pub fn stop(&mut self) {
        if self.state == SessionState::Running {
            tracing::info!("Processing stopped at {:.2}s", self.position_secs);
        }
        self.state = SessionState::Idle;
    }

    /// Drive cycles until the session settles back to Idle.
    ///
    /// Each tick drains host commands, runs one cycle, then sleeps out the
    /// rest of the nominal frame budget, so cycle n+1 never begins before
    /// cycle n has fully completed. A per-cycle failure is reported once,
    /// recorded as the session fault, and halts the session; it never
    /// escapes as a panic.
    pub fn run(&mut self) -> Result<(), PipelineError> {
        self.start()?;

        let frame_budget = Duration::from_secs_f64(1.0 / NOMINAL_FPS);

        while self.state == SessionState::Running {
            let tick_start = Instant::now();

            self.drain_commands();
            if self.state != SessionState::Running {
                break;
            }

            if let Err(err) = self.cycle() {
                tracing::error!("Frame cycle failed: {err}");
                self.last_fault = Some(err);
                self.state = SessionState::Idle;
                break;
            }

            let elapsed = tick_start.elapsed();
            if self.state == SessionState::Running && elapsed < frame_budget {
                std::thread::sleep(frame_budget - elapsed);
            }
        }

        Ok(())
    }

    /// One processing cycle: mask, effects, present, advance.
    fn cycle(&mut self) -> Result<(), PipelineError> {
        // The segmenter and the effect pass share one decode of the frame at
        // the current position.
        let decode_start = Instant::now();
        let mut frame = self
            .source
            .frame_at(self.position_secs)
            .map_err(PipelineError::Source)?;
        let decode_time = decode_start.elapsed();

        let segment_start = Instant::now();
        let mask = self
            .segmenter
            .segment(&frame, &self.options)
            .map_err(PipelineError::Segmentation)?;
        let segment_time = segment_start.elapsed();

        // A stop issued while the segmentation request was in flight takes
        // effect here: the resolved mask is discarded, nothing is presented,
        // no time advances.
        self.drain_commands();
        if self.state != SessionState::Running {
            tracing::debug!("Discarding mask resolved after stop");
            return Ok(());
        }

        if frame.dimensions() != self.dimensions {
            let (width, height) = frame.dimensions();
            return Err(PipelineError::Source(anyhow!(
                "frame resolution changed mid-clip from {}x{} to {}x{}",
                self.dimensions.0,
                self.dimensions.1,
                width,
                height
            )));
        }

        let pixel_count = frame.width() as usize * frame.height() as usize;
        if mask.len() != pixel_count {
            return Err(PipelineError::MaskSizeMismatch {
                mask_len: mask.len(),
                pixel_count,
            });
        }

        apply_speed_effects(&mut frame, &mask, &self.speeds);

        if self.debug_overlay {
            overlay::render_debug_overlay(&mask, &mut frame, overlay::DEBUG_OVERLAY_OPACITY);
        }

        let present_start = Instant::now();
        self.sink.present(&frame).map_err(PipelineError::Sink)?;
        let present_time = present_start.elapsed();

        let dominant = dominant_speed(&mask, &self.speeds);
        let now_ms = self.clock.now_ms();
        if let Some(delta_secs) = maybe_advance(now_ms, &mut self.timing, &self.speeds, dominant) {
            self.position_secs += delta_secs;
            if self.position_secs >= self.source.duration_secs() {
                tracing::info!("Reached end of clip at {:.2}s", self.position_secs);
                self.stop();
            }
        }

        self.stats.record(decode_time, segment_time, present_time, dominant);
        Ok(())
    }

    fn drain_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.apply_command(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::SetSpeed(region, value) => {
                // Handles validate before queueing; a raced invalid value is
                // still refused here rather than clamped.
                if let Err(err) = self.speeds.set_speed(region, value) {
                    tracing::warn!("Rejected speed update: {err}");
                }
            }
            Command::SelectRegion(region) => self.speeds.select_region(region),
            Command::SetSelectedSpeed(value) => {
                if let Err(err) = self.speeds.set_selected_speed(value) {
                    tracing::warn!("Rejected speed update: {err}");
                }
            }
            Command::SetDebugOverlay(enabled) => self.debug_overlay = enabled,
            Command::Stop => self.stop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::SegmentationMask;
    use anyhow::anyhow;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, OnceLock};

    /// Clock that jumps 100 ms per reading, so the advance gate is always
    /// open.
    struct StepClock {
        now_ms: Mutex<f64>,
    }

    impl StepClock {
        fn new() -> Self {
            Self {
                now_ms: Mutex::new(0.0),
            }
        }
    }

    impl Clock for StepClock {
        fn now_ms(&self) -> f64 {
            let mut now = self.now_ms.lock().unwrap();
            *now += 100.0;
            *now
        }
    }

    struct StaticSource {
        width: u32,
        height: u32,
        duration: f64,
    }

    impl FrameSource for StaticSource {
        fn frame_at(&mut self, _position_secs: f64) -> anyhow::Result<RgbaImage> {
            Ok(RgbaImage::from_pixel(
                self.width,
                self.height,
                Rgba([128, 128, 128, 255]),
            ))
        }

        fn dimensions(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        fn duration_secs(&self) -> f64 {
            self.duration
        }
    }

    /// Segmenter returning all-foreground masks, scriptable to fail, emit a
    /// stop mid-request, or produce a mask of the wrong size.
    #[derive(Default)]
    struct ScriptedSegmenter {
        calls: usize,
        fail_on_call: Option<usize>,
        stop_on_call: Option<usize>,
        stop_handle: Arc<OnceLock<PipelineHandle>>,
        fixed_mask_side: Option<u32>,
    }

    impl Segmenter for ScriptedSegmenter {
        fn segment(
            &mut self,
            frame: &RgbaImage,
            _options: &SegmentOptions,
        ) -> anyhow::Result<SegmentationMask> {
            self.calls += 1;
            if Some(self.calls) == self.fail_on_call {
                return Err(anyhow!("model backend unavailable"));
            }
            if Some(self.calls) == self.stop_on_call {
                if let Some(handle) = self.stop_handle.get() {
                    handle.stop();
                }
            }

            let (width, height) = match self.fixed_mask_side {
                Some(side) => (side, side),
                None => frame.dimensions(),
            };
            let mask = SegmentationMask::new(vec![true; (width * height) as usize], width, height)?;
            Ok(mask)
        }
    }

    struct RecordingSink {
        presents: Arc<AtomicUsize>,
    }

    impl DisplaySink for RecordingSink {
        fn present(&mut self, _frame: &RgbaImage) -> anyhow::Result<()> {
            self.presents.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn resolution(&self) -> (u32, u32) {
            (2, 2)
        }
    }

    fn test_loop(
        segmenter: ScriptedSegmenter,
        source: StaticSource,
    ) -> (
        FrameLoop<ScriptedSegmenter, StaticSource, RecordingSink, StepClock>,
        Arc<AtomicUsize>,
    ) {
        let presents = Arc::new(AtomicUsize::new(0));
        let sink = RecordingSink {
            presents: presents.clone(),
        };
        let frame_loop = FrameLoop::new(
            segmenter,
            source,
            sink,
            StepClock::new(),
            SegmentOptions::default(),
        );
        (frame_loop, presents)
    }

    fn short_clip() -> StaticSource {
        StaticSource {
            width: 2,
            height: 2,
            duration: 0.2,
        }
    }

    #[test]
    fn run_stops_at_end_of_clip() {
        let (mut frame_loop, presents) = test_loop(ScriptedSegmenter::default(), short_clip());
        frame_loop.set_speed(Region::Foreground, 2.0).unwrap();

        frame_loop.run().unwrap();

        assert!(!frame_loop.is_running());
        assert!(frame_loop.position_secs() >= 0.2);
        assert!(frame_loop.last_fault().is_none());
        assert!(presents.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn collaborator_failure_stops_session_with_single_fault() {
        let segmenter = ScriptedSegmenter {
            fail_on_call: Some(1),
            ..ScriptedSegmenter::default()
        };
        let (mut frame_loop, presents) = test_loop(segmenter, short_clip());

        frame_loop.run().unwrap();

        assert!(!frame_loop.is_running());
        assert!(matches!(
            frame_loop.last_fault(),
            Some(PipelineError::Segmentation(_))
        ));
        assert_eq!(presents.load(Ordering::SeqCst), 0);
        assert_eq!(frame_loop.position_secs(), 0.0);
    }

    #[test]
    fn mask_frame_mismatch_faults_the_cycle() {
        let segmenter = ScriptedSegmenter {
            fixed_mask_side: Some(3),
            ..ScriptedSegmenter::default()
        };
        let (mut frame_loop, presents) = test_loop(segmenter, short_clip());

        frame_loop.run().unwrap();

        assert!(matches!(
            frame_loop.last_fault(),
            Some(PipelineError::MaskSizeMismatch {
                mask_len: 9,
                pixel_count: 4
            })
        ));
        assert_eq!(presents.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_twice_is_idempotent() {
        let (mut frame_loop, _presents) = test_loop(ScriptedSegmenter::default(), short_clip());

        frame_loop.start().unwrap();
        assert!(frame_loop.is_running());

        frame_loop.start().unwrap();
        assert!(frame_loop.is_running());
        assert_eq!(frame_loop.position_secs(), 0.0);
        assert!(frame_loop.last_fault().is_none());
    }

    #[test]
    fn start_rejects_zero_sized_sources() {
        let source = StaticSource {
            width: 0,
            height: 0,
            duration: 1.0,
        };
        let (mut frame_loop, _presents) = test_loop(ScriptedSegmenter::default(), source);

        assert!(matches!(
            frame_loop.start(),
            Err(PipelineError::EmptySource { .. })
        ));
        assert!(!frame_loop.is_running());
    }

    #[test]
    fn stop_during_inflight_segmentation_discards_the_mask() {
        let stop_handle = Arc::new(OnceLock::new());
        let segmenter = ScriptedSegmenter {
            stop_on_call: Some(1),
            stop_handle: stop_handle.clone(),
            ..ScriptedSegmenter::default()
        };
        let (mut frame_loop, presents) = test_loop(segmenter, short_clip());
        stop_handle.set(frame_loop.handle()).ok().unwrap();

        frame_loop.run().unwrap();

        assert!(!frame_loop.is_running());
        assert_eq!(presents.load(Ordering::SeqCst), 0);
        assert_eq!(frame_loop.position_secs(), 0.0);
        assert!(frame_loop.last_fault().is_none());
    }

    #[test]
    fn queued_commands_apply_before_the_next_cycle() {
        let (mut frame_loop, _presents) = test_loop(ScriptedSegmenter::default(), short_clip());
        let handle = frame_loop.handle();

        handle.set_speed(Region::Background, 3.0).unwrap();
        handle.select_region(Region::Background);
        handle.set_selected_speed(2.0).unwrap();
        handle.set_debug_overlay(true);

        frame_loop.run().unwrap();

        assert_eq!(frame_loop.speeds().background_speed(), 2.0);
        assert_eq!(frame_loop.speeds().foreground_speed(), 1.0);
    }

    #[test]
    fn handle_rejects_non_positive_speeds_synchronously() {
        let (frame_loop, _presents) = test_loop(ScriptedSegmenter::default(), short_clip());
        let handle = frame_loop.handle();

        assert!(matches!(
            handle.set_speed(Region::Foreground, 0.0),
            Err(PipelineError::InvalidSpeed { .. })
        ));
        assert!(handle.set_selected_speed(-2.0).is_err());
    }
}
