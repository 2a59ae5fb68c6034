use anyhow::Result;
use image::{imageops, RgbaImage};
use ndarray::Array4;

use super::types::SegmentationMask;

/// Converts RGBA frames into model input tensors and model output back into
/// binary masks.
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Preprocess an RGBA frame into a normalized NCHW tensor.
    ///
    /// Steps:
    /// 1. Mirror if requested (undone again in postprocessing)
    /// 2. Resize to the model resolution
    /// 3. Normalize to [0, 1] and transpose HWC to NCHW
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, frame: &RgbaImage, flip_horizontal: bool) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let frame = if flip_horizontal {
            imageops::flip_horizontal(frame)
        } else {
            frame.clone()
        };

        let resized = if frame.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                &frame,
                self.target_width,
                self.target_height,
                imageops::FilterType::Lanczos3,
            )
        } else {
            frame
        };

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for y in 0..height {
            for x in 0..width {
                let pixel = resized.get_pixel(x, y);
                tensor[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
                tensor[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
                tensor[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
            }
        }

        Ok(tensor)
    }

    /// Turn a model-resolution foreground probability map into a binary mask
    /// at frame resolution.
    ///
    /// The probabilities are resized through a grayscale round-trip (the same
    /// resampling path the input took), the preprocessing mirror is undone so
    /// the mask lines up with the unflipped frame, and the result is cut at
    /// `threshold`.
    pub fn probabilities_to_mask(
        probs: &[f32],
        probs_width: u32,
        probs_height: u32,
        frame_width: u32,
        frame_height: u32,
        threshold: f32,
        flip_horizontal: bool,
    ) -> Result<SegmentationMask> {
        let _span = tracing::debug_span!("postprocess").entered();

        let gray = image::GrayImage::from_fn(probs_width, probs_height, |x, y| {
            let idx = (y * probs_width + x) as usize;
            image::Luma([(probs[idx] * 255.0).clamp(0.0, 255.0) as u8])
        });

        let gray = if flip_horizontal {
            imageops::flip_horizontal(&gray)
        } else {
            gray
        };

        let resized = if (probs_width, probs_height) != (frame_width, frame_height) {
            imageops::resize(
                &gray,
                frame_width,
                frame_height,
                imageops::FilterType::Lanczos3,
            )
        } else {
            gray
        };

        let cutoff = (threshold.clamp(0.0, 1.0) * 255.0) as u8;
        let data: Vec<bool> = resized.pixels().map(|p| p[0] >= cutoff).collect();

        Ok(SegmentationMask::new(data, frame_width, frame_height)?)
    }
}
