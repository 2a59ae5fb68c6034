use std::path::Path;

use anyhow::{Context, Result};
use image::RgbaImage;
use ort::{GraphOptimizationLevel, Session};

use super::preprocess::Preprocessor;
use super::types::{SegmentOptions, SegmentationMask};
use super::Segmenter;

/// Portrait segmentation backed by a single-pass ONNX matting network.
///
/// The network takes one normalized NCHW frame and returns a per-pixel
/// foreground probability map at model resolution, which is thresholded into
/// the binary mask the pipeline consumes.
pub struct PortraitSegmenter {
    session: Session,
}

impl PortraitSegmenter {
    /// Create a segmenter from an ONNX model file.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading segmentation model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("Segmentation model loaded successfully");

        Ok(Self { session })
    }
}

impl Segmenter for PortraitSegmenter {
    fn segment(&mut self, frame: &RgbaImage, options: &SegmentOptions) -> Result<SegmentationMask> {
        let _span = tracing::debug_span!("segment").entered();

        let side = options.internal_resolution.side();
        let preprocessor = Preprocessor::new(side, side);
        let input_tensor = preprocessor.preprocess(frame, options.flip_horizontal)?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input_tensor.view()]?)
            .context("Failed to run inference")?;
        drop(_infer_span);

        // Foreground probability map, shape [1, 1, H, W]
        let probs = outputs[0].try_extract_tensor::<f32>()?.view().to_owned();

        let shape = probs.shape().to_vec();
        let (probs_height, probs_width) = (shape[shape.len() - 2], shape[shape.len() - 1]);
        let probs_flat: Vec<f32> = probs.iter().copied().collect();

        let (frame_width, frame_height) = frame.dimensions();
        Preprocessor::probabilities_to_mask(
            &probs_flat,
            probs_width as u32,
            probs_height as u32,
            frame_width,
            frame_height,
            options.segmentation_threshold,
            options.flip_horizontal,
        )
    }
}
