use anyhow::{Context, Result};
use clap::Parser;

use temposplit::display::LoopbackSink;
use temposplit::pipeline::{FrameLoop, MonotonicClock};
use temposplit::playback::{FrameSource, ImageSequenceSource};
use temposplit::segmentation::{self, InternalResolution, SegmentOptions};
use temposplit::tempo::Region;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of numbered image frames making up the clip
    #[arg(short, long)]
    frames: String,

    /// Source clip frame rate
    #[arg(long, default_value_t = 30.0)]
    source_fps: f64,

    /// Path to the segmentation model (ONNX file)
    #[arg(short, long)]
    model: String,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Foreground playback speed multiplier
    #[arg(long, default_value_t = 1.0)]
    fg_speed: f32,

    /// Background playback speed multiplier
    #[arg(long, default_value_t = 1.0)]
    bg_speed: f32,

    /// Foreground probability cutoff
    #[arg(long, default_value_t = 0.7)]
    threshold: f32,

    /// Mirror frames before segmentation
    #[arg(long)]
    flip: bool,

    /// Model input resolution (low, medium, high, full)
    #[arg(long, default_value = "medium")]
    internal_resolution: InternalResolution,

    /// Blend the segmentation mask over the output
    #[arg(long)]
    debug_overlay: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Temposplit starting");
    tracing::info!("Clip: {} at {:.1} fps", args.frames, args.source_fps);
    tracing::info!("Speeds: fg={}x, bg={}x", args.fg_speed, args.bg_speed);

    let source = ImageSequenceSource::new(&args.frames, args.source_fps)
        .context("Failed to open frame sequence")?;
    let (width, height) = source.dimensions();

    let sink = LoopbackSink::new(&args.output_device, width, height)
        .context("Failed to initialize v4l2loopback output")?;

    let segmenter = segmentation::create_default_model(&args.model)
        .context("Failed to load segmentation model")?;

    let options = SegmentOptions {
        flip_horizontal: args.flip,
        internal_resolution: args.internal_resolution,
        segmentation_threshold: args.threshold,
    };

    let mut pipeline = FrameLoop::new(segmenter, source, sink, MonotonicClock::new(), options);
    pipeline.set_speed(Region::Foreground, args.fg_speed)?;
    pipeline.set_speed(Region::Background, args.bg_speed)?;
    pipeline.set_debug_overlay(args.debug_overlay);

    pipeline.run()?;

    if let Some(fault) = pipeline.last_fault() {
        anyhow::bail!("Processing halted: {fault}");
    }

    tracing::info!("Playback finished");
    Ok(())
}
