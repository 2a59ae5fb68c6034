use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbaImage;

use super::FrameSource;

/// Clip decoded from a directory of numbered image frames.
///
/// Frames are ordered by filename; frame `n` covers `[n/fps, (n+1)/fps)`.
/// Positions past the end resolve to the last frame.
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    fps: f64,
    width: u32,
    height: u32,
}

impl ImageSequenceSource {
    pub fn new<P: AsRef<Path>>(dir: P, fps: f64) -> Result<Self> {
        let dir = dir.as_ref();

        if fps <= 0.0 {
            bail!("Source fps must be positive, got {}", fps);
        }

        tracing::info!("Scanning frame directory {}", dir.display());

        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read frame directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("png") | Some("jpg") | Some("jpeg") | Some("bmp")
                )
            })
            .collect();
        frames.sort();

        if frames.is_empty() {
            bail!("No image frames found in {}", dir.display());
        }

        // Probe the first frame for the clip resolution.
        let first = image::open(&frames[0])
            .with_context(|| format!("Failed to decode {}", frames[0].display()))?
            .to_rgba8();
        let (width, height) = first.dimensions();

        tracing::info!(
            "{} frames at {}x{}, {:.1} fps",
            frames.len(),
            width,
            height,
            fps
        );

        Ok(Self {
            frames,
            fps,
            width,
            height,
        })
    }

    fn index_for(&self, position_secs: f64) -> usize {
        let index = (position_secs.max(0.0) * self.fps) as usize;
        index.min(self.frames.len() - 1)
    }
}

impl FrameSource for ImageSequenceSource {
    fn frame_at(&mut self, position_secs: f64) -> Result<RgbaImage> {
        let path = &self.frames[self.index_for(position_secs)];
        let frame = image::open(path)
            .with_context(|| format!("Failed to decode {}", path.display()))?
            .to_rgba8();
        Ok(frame)
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn duration_secs(&self) -> f64 {
        self.frames.len() as f64 / self.fps
    }
}
