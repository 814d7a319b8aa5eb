use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod batch;

pub use batch::{BatchReport, BatchRunner, ItemReport, ItemStatus};

use crate::acquire::{MediaSource, VideoItem};
use crate::config::OutputConfig;
use crate::extract::{Extractor, TargetSize};
use crate::generate::{generate_article, TextGenerator};
use crate::publish::{encode_thumbnail, PostDraft, PublishedPost, Publisher};
use crate::store::{ArtifactStore, ScratchGuard};
use crate::transcribe::{transcribe_audio, SpeechToText};
use crate::utils::extract_domain;
use crate::PipelineError;

/// How an item run ended without an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemOutcome {
    Published(PublishedPost),
    /// Transcription yielded nothing; generation and publishing skipped
    NoTranscript,
    /// Generation yielded nothing; publishing skipped
    NoArticle,
}

/// The external collaborators an item run calls, in order
pub struct Stages {
    pub source: Arc<dyn MediaSource>,
    pub extractor: Arc<dyn Extractor>,
    pub transcriber: Arc<dyn SpeechToText>,
    pub generator: Arc<dyn TextGenerator>,
    pub publisher: Arc<dyn Publisher>,
}

/// Something that turns one URL into at most one post
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, url: &str) -> Result<ItemOutcome, PipelineError>;
}

/// Runs acquire → extract → transcribe → generate → publish for one URL
pub struct ItemPipeline {
    stages: Stages,
    store: ArtifactStore,
    frame_count: usize,
    target: TargetSize,
}

impl ItemPipeline {
    pub fn new(stages: Stages, store: ArtifactStore, output: &OutputConfig) -> Self {
        Self {
            stages,
            store,
            frame_count: output.frame_count,
            target: TargetSize::new(output.thumbnail_width, output.thumbnail_height),
        }
    }

    async fn run(&self, url: &str) -> Result<ItemOutcome, PipelineError> {
        // Dropped on every return below, deleting whatever scratch exists by then
        let mut scratch = ScratchGuard::new();

        let site = extract_domain(url).unwrap_or_else(|| "local".to_string());
        tracing::info!(url = %url, site = %site, "Acquiring media");
        let fetched = self
            .stages
            .source
            .fetch(url, self.store.scratch_dir())
            .await
            .map_err(PipelineError::Acquisition)?;
        scratch.track(&fetched.path);

        let item = VideoItem::new(url, fetched, Local::now());
        let unique_id = item.unique_id();
        tracing::info!(unique_id = %unique_id, title = %item.title, "Media acquired");

        let audio = self.store.audio_path(&unique_id);
        scratch.track(&audio);
        self.stages
            .extractor
            .extract_audio(&item.media_path, &audio)
            .await
            .map_err(PipelineError::Extraction)?;

        let frames_dir = self.store.scratch_frames_dir(&unique_id);
        scratch.track(&frames_dir);
        let frames = self
            .stages
            .extractor
            .extract_frames(&item.media_path, self.frame_count, self.target, &frames_dir)
            .await
            .map_err(PipelineError::Extraction)?;
        if frames.is_empty() {
            return Err(PipelineError::Extraction(anyhow::anyhow!(
                "no frames could be extracted from {}",
                item.media_path.display()
            )));
        }

        let transcript = transcribe_audio(self.stages.transcriber.as_ref(), &audio).await;
        if transcript.is_empty() {
            tracing::info!(unique_id = %unique_id, "Empty transcript, skipping generation and publishing");
            return Ok(ItemOutcome::NoTranscript);
        }
        self.store
            .save_text(&self.store.transcript_path(&unique_id), &transcript)
            .map_err(PipelineError::Artifact)?;

        let Some(article) = generate_article(self.stages.generator.as_ref(), &transcript).await else {
            return Ok(ItemOutcome::NoArticle);
        };

        self.store
            .save_text(&self.store.blog_path(&unique_id), &article.to_text())
            .map_err(PipelineError::Artifact)?;
        let frames = self
            .store
            .persist_frames(&frames, &unique_id)
            .map_err(PipelineError::Artifact)?;
        let thumbnail = frames
            .thumbnail()
            .ok_or_else(|| PipelineError::Artifact(anyhow::anyhow!("thumbnail missing after move")))?;
        let thumbnail = encode_thumbnail(thumbnail).map_err(PipelineError::Artifact)?;

        let draft = PostDraft {
            video_title: item.sanitized_title.clone(),
            article,
            thumbnail,
        };
        let post = self
            .stages
            .publisher
            .publish(&draft)
            .await
            .map_err(PipelineError::Publishing)?;

        tracing::info!(unique_id = %unique_id, post = %post, "Post published");
        Ok(ItemOutcome::Published(post))
    }
}

#[async_trait]
impl ItemProcessor for ItemPipeline {
    async fn process(&self, url: &str) -> Result<ItemOutcome, PipelineError> {
        let result = self.run(url).await;
        if let Err(e) = &result {
            tracing::error!(url = %url, stage = e.stage(), "{}", e);
        }
        result
    }
}
