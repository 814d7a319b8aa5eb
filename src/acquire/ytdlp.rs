use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{discard_partial, FetchedMedia, MediaSource};
use crate::config::Config;
use crate::utils::with_timeout;
use crate::Result;

/// Platform video source using yt-dlp (YouTube Shorts, Instagram Reels, TikTok, ...)
pub struct YtDlpSource {
    yt_dlp_path: String,
    timeout: Option<Duration>,
}

impl YtDlpSource {
    pub fn new(config: &Config) -> Self {
        Self {
            yt_dlp_path: config.tools.yt_dlp.clone(),
            timeout: config.call_timeout(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Get video information using yt-dlp
    async fn get_video_info(&self, url: &str) -> Result<Value> {
        tracing::debug!("Extracting video info for: {}", url);

        let mut command = Command::new(&self.yt_dlp_path);
        command
            .args(["--dump-json", "--no-playlist", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let output = with_timeout(self.timeout, "yt-dlp metadata", async { Ok(command.output().await?) }).await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        let info: Value = serde_json::from_slice(&output.stdout)?;
        Ok(info)
    }

    /// Download the video as a single mp4 file
    async fn download_video(&self, url: &str, output_path: &Path) -> Result<()> {
        tracing::debug!("Downloading video for: {}", url);

        let output_arg = output_path.to_string_lossy().into_owned();
        let mut command = Command::new(&self.yt_dlp_path);
        command
            .args([
                "--output",
                output_arg.as_str(),
                "--format",
                "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
                "--merge-output-format",
                "mp4",
                "--no-playlist",
                "--newline",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let output = with_timeout(self.timeout, "yt-dlp download", async { Ok(command.output().await?) }).await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to download video: {}", error.trim());
        }

        if !output_path.exists() {
            anyhow::bail!("yt-dlp reported success but {} is missing", output_path.display());
        }

        Ok(())
    }
}

/// Pull title and id out of yt-dlp's `--dump-json` output
fn parse_metadata(info: &Value) -> Result<(String, String)> {
    let id = info["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow::anyhow!("yt-dlp metadata has no video id"))?;

    let title = info["title"]
        .as_str()
        .or_else(|| info["fulltitle"].as_str())
        .unwrap_or(id);

    Ok((title.to_string(), id.to_string()))
}

#[async_trait]
impl MediaSource for YtDlpSource {
    fn supports(&self, url: &str) -> bool {
        let url_lower = url.to_lowercase();
        url_lower.starts_with("http://") || url_lower.starts_with("https://")
    }

    fn platform_name(&self) -> &'static str {
        "yt-dlp (YouTube, Instagram, TikTok, ...)"
    }

    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<FetchedMedia> {
        if !self.check_availability().await {
            anyhow::bail!("yt-dlp is not available. Please install it: https://github.com/yt-dlp/yt-dlp");
        }

        let info = self.get_video_info(url).await?;
        let (title, source_id) = parse_metadata(&info)?;

        let path = dest_dir.join(format!("{}.mp4", crate::utils::sanitize_filename(&source_id)));
        if let Err(e) = self.download_video(url, &path).await {
            discard_partial(&path);
            discard_partial(&path.with_extension("mp4.part"));
            return Err(e);
        }

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
    use serde_json::json;

    #[test]
    fn metadata_prefers_title_then_fulltitle_then_id() {
        let info = json!({"id": "abc", "title": "Hello", "fulltitle": "Hello world"});
        assert_eq!(parse_metadata(&info).unwrap(), ("Hello".to_string(), "abc".to_string()));

        let info = json!({"id": "abc", "fulltitle": "Hello world"});
        assert_eq!(parse_metadata(&info).unwrap().0, "Hello world");

        let info = json!({"id": "abc"});
        assert_eq!(parse_metadata(&info).unwrap().0, "abc");
    }

    #[test]
    fn metadata_without_id_is_rejected() {
        assert!(parse_metadata(&json!({"title": "x"})).is_err());
        assert!(parse_metadata(&json!({"id": ""})).is_err());
    }

    #[test]
    fn supports_any_web_url() {
        let source = YtDlpSource::new(&Config::default());
        assert!(source.supports("https://www.youtube.com/shorts/abc"));
        assert!(source.supports("HTTPS://www.instagram.com/reel/xyz/"));
        assert!(!source.supports("./clip.mp4"));
    }

    #[tokio::test]
    async fn missing_binary_is_an_acquisition_failure() {
        let mut config = Config::default();
        config.tools.yt_dlp = "definitely-not-yt-dlp-binary".to_string();
        let source = YtDlpSource::new(&config);
        let dir = tempfile::tempdir().unwrap();

        let err = source
            .fetch("https://www.youtube.com/shorts/abc", dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("yt-dlp is not available"));
    }
}
