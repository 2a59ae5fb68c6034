//! # Temposplit
//!
//! Plays a clip while the foreground subject and the background run at
//! independently configurable speeds. Every displayed frame is segmented
//! into subject and surroundings, each region is brightened in proportion
//! to its speed, and the playback position advances by a mask-weighted
//! "dominant speed" rather than wall-clock time.
//!
//! The pipeline core ([`pipeline::FrameLoop`]) is generic over four seams:
//! a [`segmentation::Segmenter`], a [`playback::FrameSource`], a
//! [`display::DisplaySink`], and a [`pipeline::Clock`]. The shipped
//! implementations are an ONNX portrait matting model, a numbered image
//! sequence, and a v4l2loopback device.

pub mod display;
pub mod effects;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod segmentation;
pub mod tempo;

pub use crate::{
    error::PipelineError,
    pipeline::{FrameLoop, MonotonicClock, PipelineHandle},
    segmentation::{SegmentOptions, SegmentationMask, Segmenter},
    tempo::{Region, SpeedState},
};
