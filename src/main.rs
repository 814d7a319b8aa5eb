use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reel2blog::acquire::SourceRegistry;
use reel2blog::cli::{Cli, Commands};
use reel2blog::config::Config;
use reel2blog::crawl::{CrawlSettings, LinkCrawler, WebDriverSurface};
use reel2blog::extract::FfmpegExtractor;
use reel2blog::generate::OllamaGenerator;
use reel2blog::pipeline::{BatchReport, BatchRunner, ItemPipeline, Stages};
use reel2blog::publish::BloggerPublisher;
use reel2blog::store::ArtifactStore;
use reel2blog::transcribe::AwsTranscriber;
use reel2blog::{output, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let show_progress = !cli.quiet;

    match cli.command {
        Commands::Run { urls, format } => {
            let config = load_config(cli.output_root).await?;
            warn_missing_tools(&config).await;

            let report = process_batch(&config, &urls, show_progress).await?;
            output::print_report(&report, &format)?;
        }
        Commands::Crawl {
            listing_url,
            max_links,
            format,
        } => {
            let config = load_config(cli.output_root).await?;
            let links = crawl_listing(&config, &listing_url, max_links).await?;
            output::print_links(&links, &format)?;
        }
        Commands::Channel {
            listing_url,
            max_links,
            format,
        } => {
            let config = load_config(cli.output_root).await?;
            warn_missing_tools(&config).await;

            let links = crawl_listing(&config, &listing_url, max_links).await?;
            if links.is_empty() {
                tracing::warn!(listing_url = %listing_url, "No videos found on listing page");
            }

            let report = process_batch(&config, &links, show_progress).await?;
            output::print_report(&report, &format)?;
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
            }
        }
        Commands::Platforms => {
            let registry = SourceRegistry::new(&Config::default(), false)?;
            println!("Supported sources:");
            for platform in registry.list_platforms() {
                println!("  • {}", platform);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "reel2blog=debug" } else { "reel2blog=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    // Logs go to stderr so reports on stdout stay machine readable
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn load_config(output_root: Option<std::path::PathBuf>) -> Result<Config> {
    let mut config = Config::load().await?;
    if let Some(root) = output_root {
        config.output.root = root;
    }
    Ok(config)
}

/// Non-fatal: the tools may still be reachable some other way
async fn warn_missing_tools(config: &Config) {
    let missing = utils::check_dependencies(&[
        (config.tools.yt_dlp.as_str(), "needed to download platform videos"),
        (config.tools.ffmpeg.as_str(), "needed to extract audio and frames"),
        (config.tools.ffprobe.as_str(), "needed to count frames"),
    ])
    .await;

    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

async fn process_batch(config: &Config, urls: &[String], show_progress: bool) -> Result<BatchReport> {
    let credentials = BloggerPublisher::credentials_from_config(config)?;

    let stages = Stages {
        source: Arc::new(SourceRegistry::new(config, show_progress)?),
        extractor: Arc::new(FfmpegExtractor::new(config)),
        transcriber: Arc::new(AwsTranscriber::new(config, show_progress).await?),
        generator: Arc::new(OllamaGenerator::new(config)?),
        publisher: Arc::new(BloggerPublisher::new(config, credentials)?),
    };

    let store = ArtifactStore::new(&config.output)?;
    let pipeline = ItemPipeline::new(stages, store, &config.output);

    tracing::info!(items = urls.len(), "Starting batch");
    Ok(BatchRunner::new(&pipeline, show_progress).run(urls).await)
}

async fn crawl_listing(config: &Config, listing_url: &str, max_links: Option<usize>) -> Result<Vec<String>> {
    let listing_url = utils::validate_and_normalize_url(listing_url)?;
    let max_links = max_links.unwrap_or(config.crawler.max_links);

    let surface = WebDriverSurface::connect(config).await?;
    let crawler = LinkCrawler::new(CrawlSettings::from(&config.crawler));

    tracing::info!(listing_url = %listing_url, max_links, "Crawling listing");
    let links = crawler.collect_links(surface, &listing_url, max_links).await?;
    tracing::info!(found = links.len(), "Crawl finished");

    Ok(links)
}
