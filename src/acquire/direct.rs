use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::io::Write;
use std::path::Path;
use url::Url;

use super::{discard_partial, generated_source_id, FetchedMedia, MediaSource};
use crate::config::Config;
use crate::Result;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "webm", "mkv", "avi"];

/// Direct URL source for plain video files
pub struct DirectSource {
    client: Client,
    show_progress: bool,
}

impl DirectSource {
    pub fn new(config: &Config, show_progress: bool) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.call_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            show_progress,
        })
    }

    /// Extension of the last path segment, lowercased
    fn url_extension(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let filename = parsed.path_segments()?.last()?.to_string();
        Path::new(&filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Title from the file name: no extension, URL-decoded, separators as spaces
    fn title_from_url(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let filename = parsed
            .path_segments()?
            .last()
            .filter(|filename| !filename.is_empty())?
            .to_string();

        let name = match filename.rfind('.') {
            Some(dot_pos) => &filename[..dot_pos],
            None => filename.as_str(),
        };

        Some(
            urlencoding::decode(name)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| name.to_string())
                .replace(['_', '-'], " "),
        )
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if self.show_progress {
            ProgressBar::new(len)
        } else {
            ProgressBar::hidden()
        }
    }

    async fn download(&self, url: &str, output_path: &Path) -> Result<u64> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download video: HTTP {}", response.status());
        }

        let progress = self.progress_bar(response.content_length().unwrap_or(0));
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")?,
        );
        progress.set_message("Downloading video...");

        let mut file = fs_err::File::create(output_path)?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            progress.set_position(downloaded);
        }

        progress.finish_with_message("Download complete");
        Ok(downloaded)
    }
}

#[async_trait]
impl MediaSource for DirectSource {
    fn supports(&self, url: &str) -> bool {
        Self::url_extension(url)
            .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    fn platform_name(&self) -> &'static str {
        "Direct URL"
    }

    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<FetchedMedia> {
        let source_id = generated_source_id();
        let extension = Self::url_extension(url).unwrap_or_else(|| "mp4".to_string());
        let path = dest_dir.join(format!("{}.{}", source_id, extension));

        let bytes = match self.download(url, &path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                discard_partial(&path);
                return Err(e);
            }
        };
        tracing::debug!("Downloaded {} to {}", crate::utils::format_file_size(bytes), path.display());

        let title = Self::title_from_url(url).unwrap_or_else(|| source_id.clone());

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

    #[test]
    fn supports_only_video_file_urls() {
        let source = DirectSource::new(&Config::default(), true).unwrap();
        assert!(source.supports("https://cdn.example.com/clips/reel.MP4"));
        assert!(source.supports("https://cdn.example.com/a/b.webm?sig=1"));
        assert!(!source.supports("https://www.youtube.com/shorts/abc"));
        assert!(!source.supports("https://cdn.example.com/song.mp3"));
    }

    #[test]
    fn title_is_decoded_file_stem() {
        assert_eq!(
            DirectSource::title_from_url("https://cdn.example.com/my_best-clip%20ever.mp4"),
            Some("my best clip ever".to_string())
        );
        assert_eq!(DirectSource::title_from_url("https://cdn.example.com/"), None);
    }

    #[test]
    fn quiet_source_hides_progress() {
        let quiet = DirectSource::new(&Config::default(), false).unwrap();
        assert!(quiet.progress_bar(100).is_hidden());
    }

    #[tokio::test]
    async fn truncated_download_leaves_nothing_in_scratch() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Promises 1000 bytes, sends a few, hangs up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\npartial")
                .await
                .unwrap();
        });

        let source = DirectSource::new(&Config::default(), false).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = source
            .fetch(&format!("http://{}/clips/reel.mp4", addr), dir.path())
            .await;

        assert!(result.is_err());
        assert_eq!(fs_err::read_dir(dir.path()).unwrap().count(), 0);
    }
}
