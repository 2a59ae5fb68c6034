mod onnx;
mod preprocess;
pub mod types;

pub use onnx::PortraitSegmenter;
pub use preprocess::Preprocessor;
pub use types::{InternalResolution, SegmentOptions, SegmentationMask};

use anyhow::Result;
use image::RgbaImage;

/// Trait for person-segmentation backends.
///
/// The pipeline only ever sees this seam, so backends can be swapped without
/// touching the frame loop.
pub trait Segmenter {
    /// Classify every pixel of `frame` as foreground or background.
    ///
    /// The returned mask matches the frame's resolution.
    fn segment(&mut self, frame: &RgbaImage, options: &SegmentOptions) -> Result<SegmentationMask>;
}

impl<T: Segmenter + ?Sized> Segmenter for Box<T> {
    fn segment(&mut self, frame: &RgbaImage, options: &SegmentOptions) -> Result<SegmentationMask> {
        (**self).segment(frame, options)
    }
}

/// Create the default ONNX-backed segmenter.
pub fn create_default_model(model_path: &str) -> Result<Box<dyn Segmenter>> {
    let model = PortraitSegmenter::new(model_path)?;
    Ok(Box::new(model))
}
