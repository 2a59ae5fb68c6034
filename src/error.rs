use thiserror::Error;

/// Errors raised by the processing pipeline and its API boundary.
///
/// Collaborator variants wrap whatever the segmenter, frame source, or
/// display sink reported; the remaining variants are precondition violations
/// rejected before any shared state changes.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("speed must be positive, got {value}")]
    InvalidSpeed { value: f32 },

    #[error("mask has {mask_len} entries but the frame has {pixel_count} pixels")]
    MaskSizeMismatch { mask_len: usize, pixel_count: usize },

    #[error("frame source reports unusable dimensions {width}x{height}")]
    EmptySource { width: u32, height: u32 },

    #[error("segmentation failed: {0:#}")]
    Segmentation(anyhow::Error),

    #[error("frame source failed: {0:#}")]
    Source(anyhow::Error),

    #[error("display sink failed: {0:#}")]
    Sink(anyhow::Error),
}
