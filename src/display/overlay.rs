use image::RgbaImage;

use crate::segmentation::SegmentationMask;

/// Opacity the frame loop uses when the overlay is enabled.
pub const DEBUG_OVERLAY_OPACITY: f32 = 0.7;

// Tint colors carry an alpha of 100/255 before the overlay opacity applies.
const TINT_ALPHA: f32 = 100.0 / 255.0;
const FOREGROUND_TINT: [f32; 3] = [0.0, 255.0, 0.0];
const BACKGROUND_TINT: [f32; 3] = [0.0, 0.0, 255.0];

/// Blend a mask visualization over the frame: foreground pixels tint green,
/// background pixels blue. Purely informational; the pipeline's numeric path
/// never reads the result.
pub fn render_debug_overlay(mask: &SegmentationMask, frame: &mut RgbaImage, opacity: f32) {
    debug_assert_eq!(mask.len(), (frame.width() * frame.height()) as usize);

    let blend = opacity.clamp(0.0, 1.0) * TINT_ALPHA;
    let pixels: &mut [u8] = frame;

    for (i, is_foreground) in mask.iter().enumerate() {
        let tint = if is_foreground {
            FOREGROUND_TINT
        } else {
            BACKGROUND_TINT
        };

        let base = i * 4;
        for c in 0..3 {
            let value = pixels[base + c] as f32;
            pixels[base + c] = (value * (1.0 - blend) + tint[c] * blend)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    }
}
