use image::RgbaImage;

use crate::segmentation::SegmentationMask;
use crate::tempo::SpeedState;

/// Brighten each region in proportion to how far its speed exceeds 1x.
///
/// Simulated motion blur: channels are scaled in place, never spatially
/// mixed. The background boost runs at 0.7 of the foreground boost so the
/// subject reads as the faster layer. Alpha is untouched, and pixels in a
/// region at 1x or slower pass through unchanged.
///
/// The caller guarantees the mask covers the frame exactly; the loop
/// validates this before every call.
pub fn apply_speed_effects(frame: &mut RgbaImage, mask: &SegmentationMask, speeds: &SpeedState) {
    debug_assert_eq!(mask.len(), (frame.width() * frame.height()) as usize);

    let pixels: &mut [u8] = frame;
    for (i, is_foreground) in mask.iter().enumerate() {
        let speed = if is_foreground {
            speeds.foreground_speed()
        } else {
            speeds.background_speed()
        };
        if speed <= 1.0 {
            continue;
        }

        let blur_factor = (speed - 1.0) * 0.1;
        let gain = if is_foreground {
            1.0 + blur_factor
        } else {
            1.0 + blur_factor * 0.7
        };

        let base = i * 4;
        for channel in &mut pixels[base..base + 3] {
            *channel = (*channel as f32 * gain).min(255.0) as u8;
        }
    }
}
