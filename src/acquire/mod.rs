use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod direct;
pub mod local;
pub mod ytdlp;

use crate::config::Config;
use crate::utils::sanitize_filename;
use crate::Result;

/// A video fetched into the scratch directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedMedia {
    /// Local video file
    pub path: PathBuf,

    /// Human-readable title as reported by the source
    pub title: String,

    /// Identifier assigned by the source platform
    pub source_id: String,
}

/// Identity and provenance of one unit of work.
///
/// The three parts of the unique id are kept apart; the joined string only
/// exists at the filesystem boundary via [`VideoItem::unique_id`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoItem {
    pub source_url: String,
    pub media_path: PathBuf,
    pub title: String,
    pub sanitized_title: String,
    pub source_id: String,
    pub generated_at: DateTime<Local>,
}

impl VideoItem {
    pub fn new(source_url: &str, media: FetchedMedia, generated_at: DateTime<Local>) -> Self {
        Self {
            source_url: source_url.to_string(),
            media_path: media.path,
            sanitized_title: sanitize_filename(&media.title),
            title: media.title,
            source_id: media.source_id,
            generated_at,
        }
    }

    /// `<sanitized_title>_<source_id>_<YYYYMMDD_HHMMSS>`
    pub fn unique_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.sanitized_title,
            sanitize_filename(&self.source_id),
            self.generated_at.format("%Y%m%d_%H%M%S")
        )
    }
}

/// Resolves an input (URL or path) to a local video file plus metadata
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Check if this source can handle the given input
    fn supports(&self, input: &str) -> bool;

    /// Get the name of this platform
    fn platform_name(&self) -> &'static str;

    /// Fetch the video into `dest_dir`
    async fn fetch(&self, input: &str, dest_dir: &Path) -> Result<FetchedMedia>;
}

/// Registry for managing multiple sources; first match wins
pub struct SourceRegistry {
    sources: Vec<Box<dyn MediaSource>>,
}

impl SourceRegistry {
    /// Create a new registry with default sources
    pub fn new(config: &Config, show_progress: bool) -> Result<Self> {
        let mut registry = Self {
            sources: Vec::new(),
        };

        // Order matters: yt-dlp accepts any http(s) URL, so it goes last
        registry.register(Box::new(local::LocalFileSource::new(config)));
        registry.register(Box::new(direct::DirectSource::new(config, show_progress)?));
        registry.register(Box::new(ytdlp::YtDlpSource::new(config)));

        Ok(registry)
    }

    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a new source
    pub fn register(&mut self, source: Box<dyn MediaSource>) {
        self.sources.push(source);
    }

    /// Find a source that supports the given input
    pub fn find_source(&self, input: &str) -> Option<&dyn MediaSource> {
        self.sources
            .iter()
            .find(|source| source.supports(input))
            .map(|boxed| boxed.as_ref())
    }

    /// List all supported platforms
    pub fn list_platforms(&self) -> Vec<&'static str> {
        self.sources
            .iter()
            .map(|source| source.platform_name())
            .collect()
    }
}

#[async_trait]
impl MediaSource for SourceRegistry {
    fn supports(&self, input: &str) -> bool {
        self.find_source(input).is_some()
    }

    fn platform_name(&self) -> &'static str {
        "Any"
    }

    async fn fetch(&self, input: &str, dest_dir: &Path) -> Result<FetchedMedia> {
        let source = self
            .find_source(input)
            .ok_or_else(|| anyhow::anyhow!("No source found for: {}", input))?;

        tracing::debug!(platform = source.platform_name(), "Fetching {}", input);
        source.fetch(input, dest_dir).await
    }
}

/// Short random id for sources that do not provide one
pub(crate) fn generated_source_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Remove what a failed download left behind in scratch
pub(crate) fn discard_partial(path: &Path) {
    if !path.exists() {
        return;
    }
    match fs_err::remove_file(path) {
        Ok(()) => tracing::debug!("Removed partial download {}", path.display()),
        Err(e) => tracing::warn!("Failed to remove partial download: {}", e),
    }
}

/// Check if input looks like a local file path rather than a URL
pub fn is_local_file(input: &str) -> bool {
    if input.starts_with("http://") || input.starts_with("https://") {
        return false;
    }

    let path = Path::new(input);
    if path.exists() {
        return true;
    }

    let has_extension = path.extension().is_some();
    let has_path_separators = input.contains('/') || input.contains('\\');

    has_extension || has_path_separators
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(title: &str, id: &str) -> VideoItem {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        VideoItem::new(
            "https://www.youtube.com/shorts/abc",
            FetchedMedia {
                path: PathBuf::from("/tmp/abc.mp4"),
                title: title.to_string(),
                source_id: id.to_string(),
            },
            at,
        )
    }

    #[test]
    fn unique_id_joins_title_id_and_timestamp() {
        let item = item("Morning: routine?", "abc123");
        assert_eq!(item.sanitized_title, "Morning_ routine_");
        assert_eq!(item.title, "Morning: routine?");
        assert_eq!(item.unique_id(), "Morning_ routine__abc123_20240309_070501");
    }

    #[test]
    fn unique_id_strips_non_ascii_titles() {
        let item = item("Café ☕ tips", "x1");
        assert_eq!(item.unique_id(), "Caf  tips_x1_20240309_070501");
    }

    #[test]
    fn test_is_local_file() {
        assert!(!is_local_file("https://youtube.com/shorts/x"));
        assert!(is_local_file("./clip.mp4"));
        assert!(is_local_file("videos/clip"));
        assert!(!is_local_file("clip"));
    }

    #[tokio::test]
    async fn registry_dispatches_to_first_supporting_source() {
        let mut first = MockMediaSource::new();
        first.expect_supports().returning(|input| input.ends_with(".mp4"));
        first.expect_platform_name().return_const("Direct");
        first.expect_fetch().times(1).returning(|_, dir| {
            Ok(FetchedMedia {
                path: dir.join("a.mp4"),
                title: "a".to_string(),
                source_id: "1".to_string(),
            })
        });

        let mut second = MockMediaSource::new();
        second.expect_supports().returning(|_| true);
        second.expect_platform_name().return_const("Catch-all");
        second.expect_fetch().never();

        let mut registry = SourceRegistry::empty();
        registry.register(Box::new(first));
        registry.register(Box::new(second));

        let fetched = registry
            .fetch("https://cdn.example.com/a.mp4", Path::new("/scratch"))
            .await
            .unwrap();
        assert_eq!(fetched.path, PathBuf::from("/scratch/a.mp4"));
        assert_eq!(registry.list_platforms(), vec!["Direct", "Catch-all"]);
    }

    #[test]
    fn discard_partial_removes_leftovers_and_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("abc.mp4.part");
        fs_err::write(&partial, b"half").unwrap();

        discard_partial(&partial);
        discard_partial(&dir.path().join("never-written.mp4"));

        assert!(!partial.exists());
    }

    #[tokio::test]
    async fn registry_without_match_is_an_error() {
        let registry = SourceRegistry::empty();
        assert!(!registry.supports("https://example.com"));
        assert!(registry.fetch("https://example.com", Path::new("/x")).await.is_err());
    }
}
