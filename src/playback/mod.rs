mod image_sequence;

pub use image_sequence::ImageSequenceSource;

use anyhow::Result;
use image::RgbaImage;

/// Trait for seekable clip sources.
pub trait FrameSource {
    /// Decode the frame covering the given clip timestamp.
    fn frame_at(&mut self, position_secs: f64) -> Result<RgbaImage>;

    /// Resolution of decoded frames.
    fn dimensions(&self) -> (u32, u32);

    /// Total clip length in seconds.
    fn duration_secs(&self) -> f64;
}
