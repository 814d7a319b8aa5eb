use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use super::{fit_frame, sample_frame_indices, Extractor, FrameSet, TargetSize};
use crate::config::Config;
use crate::utils::with_timeout;

/// Audio and frame extraction through the ffmpeg / ffprobe binaries
pub struct FfmpegExtractor {
    ffmpeg_path: String,
    ffprobe_path: String,
    timeout: Option<Duration>,
}

impl FfmpegExtractor {
    pub fn new(config: &Config) -> Self {
        Self {
            ffmpeg_path: config.tools.ffmpeg.clone(),
            ffprobe_path: config.tools.ffprobe.clone(),
            timeout: config.call_timeout(),
        }
    }

    /// Run a tool to completion, failing on a non-zero exit status
    async fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>> {
        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        let output = with_timeout(self.timeout, program, async {
            command
                .output()
                .await
                .with_context(|| format!("Failed to start {}", program))
        })
        .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} exited with {}: {}", program, output.status, error.trim());
        }

        Ok(output.stdout)
    }

    /// Count video frames by decoding packet headers
    async fn count_frames(&self, video: &Path) -> Result<usize> {
        let stdout = self
            .run(
                &self.ffprobe_path,
                &[
                    "-v".into(), "error".into(),
                    "-select_streams".into(), "v:0".into(),
                    "-count_packets".into(),
                    "-show_entries".into(), "stream=nb_read_packets".into(),
                    "-of".into(), "csv=p=0".into(),
                    video.to_string_lossy().into_owned(),
                ],
            )
            .await?;

        parse_frame_count(&String::from_utf8_lossy(&stdout))
    }

    /// Dump the frame at `index` as a lossless PNG
    async fn grab_frame(&self, video: &Path, index: usize, output: &Path) -> Result<()> {
        self.run(
            &self.ffmpeg_path,
            &[
                "-v".into(), "error".into(),
                "-i".into(), video.to_string_lossy().into_owned(),
                "-vf".into(), format!("select=eq(n\\,{})", index),
                "-frames:v".into(), "1".into(),
                "-y".into(),
                output.to_string_lossy().into_owned(),
            ],
        )
        .await?;
        Ok(())
    }
}

fn parse_frame_count(stdout: &str) -> Result<usize> {
    let value = stdout
        .lines()
        .map(|line| line.trim().trim_end_matches(','))
        .find(|line| !line.is_empty())
        .ok_or_else(|| anyhow::anyhow!("ffprobe reported no video stream"))?;

    value
        .parse::<usize>()
        .with_context(|| format!("Unexpected frame count from ffprobe: {}", value))
}

/// Decode, fit and re-encode one frame as JPEG
fn fit_and_save(raw: &Path, output: &Path, target: TargetSize) -> Result<()> {
    let image = image::open(raw).with_context(|| format!("Failed to decode {}", raw.display()))?;
    fit_frame(&image, target)
        .to_rgb8()
        .save_with_format(output, image::ImageFormat::Jpeg)
        .with_context(|| format!("Failed to encode {}", output.display()))?;
    fs_err::remove_file(raw)?;
    Ok(())
}

#[async_trait]
impl Extractor for FfmpegExtractor {
    async fn extract_audio(&self, video: &Path, output: &Path) -> Result<()> {
        tracing::debug!("Extracting audio from {}", video.display());

        self.run(
            &self.ffmpeg_path,
            &[
                "-i".into(), video.to_string_lossy().into_owned(),
                "-vn".into(), // No video
                "-acodec".into(), "mp3".into(),
                "-ab".into(), "128k".into(),
                "-ar".into(), "44100".into(),
                "-y".into(),
                output.to_string_lossy().into_owned(),
            ],
        )
        .await?;

        tracing::info!("Audio extracted to {}", output.display());
        Ok(())
    }

    async fn extract_frames(
        &self,
        video: &Path,
        count: usize,
        target: TargetSize,
        output_dir: &Path,
    ) -> Result<FrameSet> {
        fs_err::create_dir_all(output_dir)?;

        let total = self.count_frames(video).await?;
        let indices = sample_frame_indices(total, count, &mut rand::rng());
        tracing::debug!(total, ?indices, "Sampled frames");

        let mut frames: Vec<PathBuf> = Vec::with_capacity(indices.len());
        for (n, index) in indices.into_iter().enumerate() {
            let raw = output_dir.join(format!("raw_{}.png", n + 1));
            let frame = output_dir.join(format!("frame_{}.jpg", n + 1));
            self.grab_frame(video, index, &raw).await?;

            let (raw_path, frame_path) = (raw.clone(), frame.clone());
            tokio::task::spawn_blocking(move || fit_and_save(&raw_path, &frame_path, target))
                .await
                .context("Frame resize task panicked")??;

            frames.push(frame);
        }

        tracing::info!(count = frames.len(), "Frames extracted to {}", output_dir.display());
        Ok(FrameSet::new(frames))
    }
}
