use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod ffmpeg;
pub mod frames;

pub use ffmpeg::FfmpegExtractor;
pub use frames::{crop_plan, fit_frame, sample_frame_indices, CropPlan};

use crate::Result;

/// Fixed output size every frame is fitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Extracted frames in timeline order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSet {
    paths: Vec<PathBuf>,
}

impl FrameSet {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// The frame used as the post thumbnail
    pub fn thumbnail(&self) -> Option<&Path> {
        self.paths.first().map(PathBuf::as_path)
    }
}

/// Derives audio and still frames from a local video file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Write the audio track of `video` to `output`
    async fn extract_audio(&self, video: &Path, output: &Path) -> Result<()>;

    /// Sample up to `count` frames, fit each to `target`, and write them
    /// into `output_dir`
    async fn extract_frames(
        &self,
        video: &Path,
        count: usize,
        target: TargetSize,
        output_dir: &Path,
    ) -> Result<FrameSet>;
}
