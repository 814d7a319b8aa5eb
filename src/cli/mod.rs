use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "reel2blog",
    about = "Turn short-form videos into published blog posts",
    version,
    long_about = "Downloads videos, extracts audio and thumbnails, transcribes them with AWS Transcribe, writes an article with a local language model and publishes it to Blogger. Can also crawl a channel listing to find the videos."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output root directory (overrides output.root)
    #[arg(long, global = true, env = "REEL2BLOG_OUTPUT", value_name = "DIR")]
    pub output_root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Turn each video URL or local file into a blog post
    Run {
        /// Video URLs or local video files, processed in order
        #[arg(value_name = "URL_OR_FILE", required = true)]
        urls: Vec<String>,

        /// Report format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Collect video links from a channel listing page
    Crawl {
        /// Listing page to scroll through
        #[arg(value_name = "LISTING_URL")]
        listing_url: String,

        /// Stop after this many links (overrides crawler.max_links)
        #[arg(short, long, value_name = "COUNT")]
        max_links: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Crawl a channel listing, then turn every discovered video into a post
    Channel {
        /// Listing page to scroll through
        #[arg(value_name = "LISTING_URL")]
        listing_url: String,

        /// Stop after this many links (overrides crawler.max_links)
        #[arg(short, long, value_name = "COUNT")]
        max_links: Option<usize>,

        /// Report format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported media sources
    Platforms,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable summary
    Text,
    /// JSON document
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_takes_several_urls_in_order() {
        let cli = Cli::try_parse_from(["reel2blog", "run", "https://a.test/1", "clip.mp4"]).unwrap();
        match cli.command {
            Commands::Run { urls, format } => {
                assert_eq!(urls, vec!["https://a.test/1", "clip.mp4"]);
                assert_eq!(format, OutputFormat::Text);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn run_requires_a_url() {
        assert!(Cli::try_parse_from(["reel2blog", "run"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "reel2blog",
            "crawl",
            "https://a.test/@chan/shorts",
            "--max-links",
            "10",
            "--format",
            "json",
            "--log-json",
            "-q",
        ])
        .unwrap();

        assert!(cli.log_json);
        assert!(cli.quiet);
        match cli.command {
            Commands::Crawl { max_links, format, .. } => {
                assert_eq!(max_links, Some(10));
                assert_eq!(format.to_string(), "json");
            }
            _ => panic!("expected crawl"),
        }
    }
}
