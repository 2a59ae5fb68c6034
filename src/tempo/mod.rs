mod advance;
mod speed;

pub use advance::{maybe_advance, FrameTiming, NOMINAL_FPS};
pub use speed::{dominant_speed, Region, SpeedState};
