use std::str::FromStr;

use crate::error::PipelineError;

/// Per-pixel foreground/background classification for one frame, row-major.
///
/// Index correspondence with the frame buffer: mask entry `i` describes the
/// pixel whose channels live at `i*4 .. i*4+3`.
#[derive(Debug, Clone)]
pub struct SegmentationMask {
    data: Vec<bool>,
    width: u32,
    height: u32,
}

impl SegmentationMask {
    /// Build a mask, enforcing that it covers the frame exactly.
    pub fn new(data: Vec<bool>, width: u32, height: u32) -> Result<Self, PipelineError> {
        let pixel_count = width as usize * height as usize;
        if data.len() != pixel_count {
            return Err(PipelineError::MaskSizeMismatch {
                mask_len: data.len(),
                pixel_count,
            });
        }
        Ok(Self { data, width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_foreground(&self, index: usize) -> bool {
        self.data[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.data.iter().copied()
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&fg| fg).count()
    }
}

/// Model input resolution, trading segmentation quality for speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalResolution {
    Low,
    Medium,
    High,
    Full,
}

impl InternalResolution {
    /// Square model-input side length in pixels.
    pub fn side(self) -> u32 {
        match self {
            Self::Low => 256,
            Self::Medium => 512,
            Self::High => 768,
            Self::Full => 1024,
        }
    }
}

impl FromStr for InternalResolution {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "full" => Ok(Self::Full),
            other => Err(format!(
                "unknown internal resolution '{other}' (expected low, medium, high, or full)"
            )),
        }
    }
}

/// Options forwarded to the segmenter with every frame.
#[derive(Debug, Clone)]
pub struct SegmentOptions {
    /// Mirror the frame before inference (selfie-style sources).
    pub flip_horizontal: bool,

    /// Resolution the model sees internally.
    pub internal_resolution: InternalResolution,

    /// Foreground probability cutoff in [0, 1].
    pub segmentation_threshold: f32,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            flip_horizontal: false,
            internal_resolution: InternalResolution::Medium,
            segmentation_threshold: 0.7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_rejects_length_mismatch() {
        let result = SegmentationMask::new(vec![true; 5], 2, 3);
        assert!(matches!(
            result,
            Err(PipelineError::MaskSizeMismatch { mask_len: 5, pixel_count: 6 })
        ));
    }

    #[test]
    fn mask_counts_foreground_pixels() {
        let mask = SegmentationMask::new(vec![true, false, true, false], 2, 2).unwrap();
        assert_eq!(mask.foreground_count(), 2);
        assert_eq!(mask.len(), 4);
        assert!(mask.is_foreground(0));
        assert!(!mask.is_foreground(1));
    }

    #[test]
    fn internal_resolution_parses_from_cli_names() {
        assert_eq!("low".parse::<InternalResolution>().unwrap(), InternalResolution::Low);
        assert_eq!("full".parse::<InternalResolution>().unwrap(), InternalResolution::Full);
        assert!("ultra".parse::<InternalResolution>().is_err());
    }
}
