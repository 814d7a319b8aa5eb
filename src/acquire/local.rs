use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;

use super::{generated_source_id, is_local_file, FetchedMedia, MediaSource};
use crate::config::Config;
use crate::utils::with_timeout;

/// Local video files. The file is copied into scratch so the end-of-run
/// cleanup never touches the user's original.
pub struct LocalFileSource {
    ffprobe_path: String,
    timeout: Option<Duration>,
}

impl LocalFileSource {
    pub fn new(config: &Config) -> Self {
        Self {
            ffprobe_path: config.tools.ffprobe.clone(),
            timeout: config.call_timeout(),
        }
    }

    /// Check if the file exists and is accessible
    async fn validate_file(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            anyhow::bail!("File does not exist: {}", path.display());
        }

        if !path.is_file() {
            anyhow::bail!("Path is not a file: {}", path.display());
        }

        let metadata = fs::metadata(path)
            .await
            .with_context(|| format!("Cannot access file {}", path.display()))?;
        if metadata.len() == 0 {
            anyhow::bail!("File is empty: {}", path.display());
        }

        Ok(())
    }

    /// Make sure ffprobe sees a video stream
    async fn probe_video_stream(&self, path: &Path) -> Result<()> {
        let path_arg = path.to_string_lossy().into_owned();
        let mut command = Command::new(&self.ffprobe_path);
        command
            .args([
                "-v", "quiet",
                "-print_format", "json",
                "-show_streams",
                path_arg.as_str(),
            ])
            .kill_on_drop(true);
        let output = with_timeout(self.timeout, "ffprobe", async { Ok(command.output().await?) }).await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to analyze file with ffprobe: {}", error);
        }

        let info: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        let has_video = info["streams"]
            .as_array()
            .map(|streams| streams.iter().any(|s| s["codec_type"].as_str() == Some("video")))
            .unwrap_or(false);

        if !has_video {
            anyhow::bail!("File does not contain any video streams: {}", path.display());
        }

        Ok(())
    }
}

#[async_trait]
impl MediaSource for LocalFileSource {
    fn supports(&self, input: &str) -> bool {
        is_local_file(input)
    }

    fn platform_name(&self) -> &'static str {
        "Local File"
    }

    async fn fetch(&self, input: &str, dest_dir: &Path) -> Result<FetchedMedia> {
        let source_path = Path::new(input);
        self.validate_file(source_path).await?;
        self.probe_video_stream(source_path).await?;

        let title = source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Local File")
            .to_string();
        let source_id = generated_source_id();
        let extension = source_path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("mp4");

        let path = dest_dir.join(format!("{}.{}", source_id, extension));
        fs::copy(source_path, &path)
            .await
            .with_context(|| format!("Failed to copy {} into scratch", source_path.display()))?;

        Ok(FetchedMedia {
            path,
            title,
            source_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_rejected() {
        let source = LocalFileSource::new(&Config::default());
        let dir = tempfile::tempdir().unwrap();
        let err = source
            .fetch("./no/such/clip.mp4", dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let source = LocalFileSource::new(&Config::default());
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("empty.mp4");
        fs_err::write(&clip, b"").unwrap();

        let err = source
            .fetch(&clip.to_string_lossy(), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("File is empty"));
    }
}
