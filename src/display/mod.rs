mod loopback;
pub mod overlay;

pub use loopback::LoopbackSink;

use anyhow::Result;
use image::RgbaImage;

/// Trait for display surfaces.
pub trait DisplaySink {
    /// Present a processed frame.
    fn present(&mut self, frame: &RgbaImage) -> Result<()>;

    /// Resolution the surface expects.
    fn resolution(&self) -> (u32, u32);
}
