use crate::error::PipelineError;
use crate::segmentation::SegmentationMask;

/// Which half of a segmentation mask a speed setting applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Foreground,
    Background,
}

/// The two region playback speeds plus the region currently selected for
/// editing.
///
/// Mutated only through host commands; every per-frame stage reads it by
/// shared reference.
#[derive(Debug, Clone)]
pub struct SpeedState {
    foreground_speed: f32,
    background_speed: f32,
    selected_region: Region,
}

impl Default for SpeedState {
    fn default() -> Self {
        Self {
            foreground_speed: 1.0,
            background_speed: 1.0,
            selected_region: Region::Foreground,
        }
    }
}

impl SpeedState {
    pub fn foreground_speed(&self) -> f32 {
        self.foreground_speed
    }

    pub fn background_speed(&self) -> f32 {
        self.background_speed
    }

    pub fn selected_region(&self) -> Region {
        self.selected_region
    }

    pub fn speed_for(&self, region: Region) -> f32 {
        match region {
            Region::Foreground => self.foreground_speed,
            Region::Background => self.background_speed,
        }
    }

    /// Set a region's speed multiplier.
    ///
    /// Non-positive (or NaN) values are rejected without touching state.
    pub fn set_speed(&mut self, region: Region, value: f32) -> Result<(), PipelineError> {
        if !(value > 0.0) {
            return Err(PipelineError::InvalidSpeed { value });
        }
        match region {
            Region::Foreground => self.foreground_speed = value,
            Region::Background => self.background_speed = value,
        }
        Ok(())
    }

    pub fn select_region(&mut self, region: Region) {
        self.selected_region = region;
    }

    /// Slider semantics: update whichever region is currently selected.
    pub fn set_selected_speed(&mut self, value: f32) -> Result<(), PipelineError> {
        self.set_speed(self.selected_region, value)
    }
}

/// Blend the two region speeds into a single scalar for the frame, weighted
/// by the fraction of mask pixels each region covers.
///
/// An all-foreground or all-background mask degenerates to the corresponding
/// region speed exactly.
pub fn dominant_speed(mask: &SegmentationMask, speeds: &SpeedState) -> f32 {
    let fg_ratio = mask.foreground_count() as f32 / mask.len() as f32;
    fg_ratio * speeds.foreground_speed + (1.0 - fg_ratio) * speeds.background_speed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_of(bits: &[bool]) -> SegmentationMask {
        SegmentationMask::new(bits.to_vec(), bits.len() as u32, 1).unwrap()
    }

    fn speeds(fg: f32, bg: f32) -> SpeedState {
        let mut state = SpeedState::default();
        state.set_speed(Region::Foreground, fg).unwrap();
        state.set_speed(Region::Background, bg).unwrap();
        state
    }

    #[test]
    fn all_background_returns_background_speed() {
        let mask = mask_of(&[false; 6]);
        assert_eq!(dominant_speed(&mask, &speeds(2.0, 0.5)), 0.5);
    }

    #[test]
    fn all_foreground_returns_foreground_speed() {
        let mask = mask_of(&[true; 8]);
        assert_eq!(dominant_speed(&mask, &speeds(2.0, 1.0)), 2.0);
    }

    #[test]
    fn half_foreground_blends_evenly() {
        let mask = mask_of(&[true, true, false, false]);
        assert_eq!(dominant_speed(&mask, &speeds(2.0, 1.0)), 1.5);
    }

    #[test]
    fn estimate_stays_between_region_speeds() {
        let mask = mask_of(&[true, false, true, false, false]);
        for &(fg, bg) in &[(2.0, 0.5), (0.25, 4.0), (1.0, 1.0), (3.5, 3.5)] {
            let result = dominant_speed(&mask, &speeds(fg, bg));
            assert!(
                result >= fg.min(bg) && result <= fg.max(bg),
                "fg={fg} bg={bg} got {result}"
            );
        }
    }

    #[test]
    fn non_positive_speed_is_rejected_without_state_change() {
        let mut state = SpeedState::default();
        assert!(state.set_speed(Region::Foreground, 0.0).is_err());
        assert!(state.set_speed(Region::Background, -1.5).is_err());
        assert!(state.set_speed(Region::Foreground, f32::NAN).is_err());
        assert_eq!(state.foreground_speed(), 1.0);
        assert_eq!(state.background_speed(), 1.0);
    }

    #[test]
    fn selected_speed_updates_only_selected_region() {
        let mut state = SpeedState::default();
        state.select_region(Region::Background);
        state.set_selected_speed(2.5).unwrap();
        assert_eq!(state.background_speed(), 2.5);
        assert_eq!(state.foreground_speed(), 1.0);

        state.select_region(Region::Foreground);
        state.set_selected_speed(0.75).unwrap();
        assert_eq!(state.foreground_speed(), 0.75);
        assert_eq!(state.background_speed(), 2.5);
    }
}
