//! reel2blog - turn short-form videos into published blog posts
//!
//! Each video runs through acquire → extract → transcribe → generate → publish,
//! one item at a time, with scratch files cleaned up whatever the outcome.
//! A link crawler can discover the videos from a channel listing first.

pub mod acquire;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod extract;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod publish;
pub mod store;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use crawl::{BrowsingSurface, LinkCrawler};
pub use pipeline::{BatchReport, BatchRunner, ItemOutcome, ItemPipeline, ItemProcessor, Stages};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Why a single item stopped early
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("acquisition failed: {0:#}")]
    Acquisition(anyhow::Error),

    #[error("extraction failed: {0:#}")]
    Extraction(anyhow::Error),

    #[error("publishing failed: {0:#}")]
    Publishing(anyhow::Error),

    #[error("saving artifacts failed: {0:#}")]
    Artifact(anyhow::Error),
}

impl PipelineError {
    /// Short name of the stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Acquisition(_) => "acquisition",
            PipelineError::Extraction(_) => "extraction",
            PipelineError::Publishing(_) => "publishing",
            PipelineError::Artifact(_) => "artifact",
        }
    }
}
