use anyhow::{Context, Result};
use aws_types::region::Region;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Output layout and thumbnail settings
    pub output: OutputConfig,

    /// External command-line tools
    pub tools: ToolsConfig,

    /// Limits on external calls
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// AWS configuration used for transcription
    pub aws: AwsConfig,

    /// Text generation backend
    pub generation: GenerationConfig,

    /// Blog publishing backend
    pub publishing: PublishingConfig,

    /// Listing page crawler
    pub crawler: CrawlerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for `blogs/` and `images/`
    pub root: PathBuf,

    /// Extension of the saved article file
    pub blog_extension: String,

    /// Number of frames to sample from each video
    pub frame_count: usize,

    /// Thumbnail width in pixels
    pub thumbnail_width: u32,

    /// Thumbnail height in pixels
    pub thumbnail_height: u32,

    /// Temporary directory for downloads and scratch files
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub yt_dlp: String,
    pub ffmpeg: String,
    pub ffprobe: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Upper bound for any single download, subprocess or service call.
    /// Unset means wait forever.
    pub external_call_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,

    /// S3 bucket for temporary audio storage
    pub s3_bucket: String,

    /// Optional S3 key prefix
    pub s3_key_prefix: Option<String>,

    /// Language code; automatic identification when unset
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the Ollama server
    pub ollama_url: String,

    /// Chat model name
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    /// Target blog id
    pub blog_id: String,

    /// Blogger API base URL
    pub api_base: String,

    /// Command that prints a fresh access token on stdout
    pub token_command: Option<String>,

    /// Fixed access token, used when no command is configured
    pub access_token: Option<String>,

    /// How long a fetched token is trusted before it is refreshed
    pub token_lifetime_secs: u64,

    /// Create posts as drafts instead of publishing them
    pub draft: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// WebDriver endpoint (chromedriver, geckodriver, ...)
    pub webdriver_url: String,

    /// CSS selector for candidate link elements
    pub link_selector: String,

    /// Substring a link must contain to count as an item
    pub item_path_marker: String,

    /// Default maximum number of links to collect
    pub max_links: usize,

    /// Longest wait for new content after each scroll
    pub settle_timeout_ms: u64,

    /// Interval between content-size checks while settling
    pub poll_interval_ms: u64,

    /// Fixed pause used when the page cannot report its size
    pub fallback_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: OutputConfig {
                root: PathBuf::from("output"),
                blog_extension: "txt".to_string(),
                frame_count: 5,
                thumbnail_width: 1280,
                thumbnail_height: 720,
                temp_dir: None,
            },
            tools: ToolsConfig {
                yt_dlp: "yt-dlp".to_string(),
                ffmpeg: "ffmpeg".to_string(),
                ffprobe: "ffprobe".to_string(),
            },
            timeouts: TimeoutConfig::default(),
            aws: AwsConfig {
                region: "us-east-1".to_string(),
                s3_bucket: "".to_string(),
                s3_key_prefix: Some("reel2blog/".to_string()),
                language: None,
            },
            generation: GenerationConfig {
                ollama_url: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
            },
            publishing: PublishingConfig {
                blog_id: "".to_string(),
                api_base: "https://www.googleapis.com/blogger/v3".to_string(),
                token_command: Some("gcloud auth print-access-token".to_string()),
                access_token: None,
                token_lifetime_secs: 3000,
                draft: false,
            },
            crawler: CrawlerConfig {
                webdriver_url: "http://localhost:9515".to_string(),
                link_selector: "a[href]".to_string(),
                item_path_marker: "/shorts/".to_string(),
                max_links: 20,
                settle_timeout_ms: 5000,
                poll_interval_ms: 250,
                fallback_delay_ms: 2000,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config = Self::from_yaml(&content)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("reel2blog.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("reel2blog").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.output.thumbnail_width == 0 || self.output.thumbnail_height == 0 {
            anyhow::bail!("Thumbnail dimensions must be non-zero");
        }

        if self.output.frame_count == 0 {
            anyhow::bail!("Frame count must be at least 1");
        }

        if self.crawler.item_path_marker.is_empty() {
            anyhow::bail!("Crawler item path marker must not be empty");
        }

        if self.crawler.poll_interval_ms == 0
            || self.crawler.poll_interval_ms > self.crawler.settle_timeout_ms
        {
            anyhow::bail!("Crawler poll interval must be between 1ms and the settle timeout");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Output Root: {}", self.output.root.display());
        println!("  Frames: {} at {}x{}", self.output.frame_count, self.output.thumbnail_width, self.output.thumbnail_height);
        match self.timeouts.external_call_secs {
            Some(secs) => println!("  External Call Timeout: {}s", secs),
            None => println!("  External Call Timeout: none"),
        }
        println!("  AWS Region: {}", self.aws.region);
        println!("  S3 Bucket: {}", self.aws.s3_bucket);
        if let Some(prefix) = &self.aws.s3_key_prefix {
            println!("  S3 Prefix: {}", prefix);
        }
        println!("  Ollama: {} ({})", self.generation.ollama_url, self.generation.model);
        println!("  Blog Id: {}", self.publishing.blog_id);
        println!("  Draft Posts: {}", self.publishing.draft);
        println!("  WebDriver: {}", self.crawler.webdriver_url);
        println!("  Item Marker: {}", self.crawler.item_path_marker);
    }

    /// Get AWS region
    pub fn aws_region(&self) -> Region {
        Region::new(self.aws.region.clone())
    }

    /// Timeout applied to every external call, if any
    pub fn call_timeout(&self) -> Option<Duration> {
        self.timeouts.external_call_secs.map(Duration::from_secs)
    }

    /// Fail early when a stage that needs AWS is missing its bucket
    pub fn require_s3_bucket(&self) -> Result<()> {
        if self.aws.s3_bucket.is_empty() {
            anyhow::bail!("AWS S3 bucket must be configured (aws.s3_bucket)");
        }
        Ok(())
    }

    /// Fail early when publishing is not configured
    pub fn require_blog_id(&self) -> Result<()> {
        if self.publishing.blog_id.is_empty() {
            anyhow::bail!("Blog id must be configured (publishing.blog_id)");
        }
        Ok(())
    }
}
