use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_transcribe::types::{Media, MediaFormat, TranscriptionJob, TranscriptionJobStatus};
use aws_sdk_transcribe::Client as TranscribeClient;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use uuid::Uuid;

use super::{RecognitionError, SpeechToText};
use crate::config::Config;
use crate::utils::with_timeout;

/// AWS Transcribe transcript format (only the parts we read)
#[derive(Debug, Deserialize)]
struct AwsTranscript {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    transcripts: Vec<TranscriptText>,
}

#[derive(Debug, Deserialize)]
struct TranscriptText {
    transcript: String,
}

/// Speech-to-text through AWS Transcribe: the audio is staged in S3,
/// a batch job is polled to completion, and the staged object is removed.
pub struct AwsTranscriber {
    s3_client: S3Client,
    transcribe_client: TranscribeClient,
    http: reqwest::Client,
    bucket: String,
    key_prefix: String,
    language: Option<String>,
    timeout: Option<Duration>,
    show_progress: bool,
}

impl AwsTranscriber {
    pub async fn new(config: &Config, show_progress: bool) -> Result<Self> {
        config.require_s3_bucket()?;

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(config.aws_region())
            .load()
            .await;

        let mut http = reqwest::Client::builder();
        if let Some(timeout) = config.call_timeout() {
            http = http.timeout(timeout);
        }

        Ok(Self {
            s3_client: S3Client::new(&aws_config),
            transcribe_client: TranscribeClient::new(&aws_config),
            http: http.build()?,
            bucket: config.aws.s3_bucket.clone(),
            key_prefix: config.aws.s3_key_prefix.clone().unwrap_or_default(),
            language: config.aws.language.clone(),
            timeout: config.call_timeout(),
            show_progress,
        })
    }

    /// Upload audio file to S3
    async fn upload_to_s3(&self, audio_path: &Path) -> Result<String> {
        let key = format!(
            "{}audio_{}_{}.mp3",
            self.key_prefix,
            Uuid::new_v4(),
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
        );

        tracing::info!("Uploading audio to S3: s3://{}/{}", self.bucket, key);

        let content = fs_err::read(audio_path)?;

        self.s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(content.into())
            .content_type("audio/mpeg")
            .send()
            .await
            .context("Failed to upload audio to S3")?;

        Ok(key)
    }

    /// Start AWS Transcribe job, identifying the language unless one is configured
    async fn start_transcription_job(&self, s3_key: &str) -> Result<String> {
        let job_name = format!("reel2blog_{}", Uuid::new_v4());
        let media_uri = format!("s3://{}/{}", self.bucket, s3_key);

        tracing::info!("Starting transcription job: {}", job_name);

        let media = Media::builder().media_file_uri(media_uri).build();

        let mut job_builder = self
            .transcribe_client
            .start_transcription_job()
            .transcription_job_name(&job_name)
            .media_format(MediaFormat::Mp3)
            .media_sample_rate_hertz(44100)
            .media(media);

        job_builder = match &self.language {
            Some(lang) => job_builder.language_code(lang.as_str().into()),
            None => job_builder.identify_language(true),
        };

        job_builder
            .send()
            .await
            .context("Failed to start transcription job")?;

        Ok(job_name)
    }

    /// Get transcription job details
    async fn get_transcription_job(&self, job_name: &str) -> Result<TranscriptionJob> {
        let response = self
            .transcribe_client
            .get_transcription_job()
            .transcription_job_name(job_name)
            .send()
            .await
            .context("Failed to get transcription job status")?;

        response
            .transcription_job()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Transcription job not found"))
    }

    /// Poll until the job finishes and return the transcript file URI
    async fn wait_for_completion(&self, job_name: &str) -> Result<String> {
        let progress = if self.show_progress {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        progress.set_message("Starting transcription job...");

        let start_time = Instant::now();
        let mut check_count = 0u64;

        loop {
            check_count += 1;
            let job = self.get_transcription_job(job_name).await?;

            match job.transcription_job_status() {
                Some(TranscriptionJobStatus::InProgress) | Some(TranscriptionJobStatus::Queued) => {
                    progress.set_message(format!(
                        "Transcribing... ({}s elapsed, check #{})",
                        start_time.elapsed().as_secs(),
                        check_count
                    ));

                    // Back off up to 30 seconds between checks
                    let wait_time = std::cmp::min(5 + (check_count - 1) * 2, 30);
                    sleep(Duration::from_secs(wait_time)).await;
                }
                Some(TranscriptionJobStatus::Completed) => {
                    progress.finish_with_message("Transcription completed!");
                    return job
                        .transcript()
                        .and_then(|t| t.transcript_file_uri())
                        .map(str::to_string)
                        .ok_or_else(|| anyhow::anyhow!("No transcript URI found"));
                }
                Some(TranscriptionJobStatus::Failed) => {
                    progress.finish_with_message("Transcription failed");
                    let failure_reason = job.failure_reason().unwrap_or("Unknown error");
                    anyhow::bail!("Transcription job failed: {}", failure_reason);
                }
                _ => {
                    progress.finish_with_message("Transcription status unknown");
                    anyhow::bail!("Unexpected transcription job status");
                }
            }
        }
    }

    /// Download the transcript JSON and pull out the full text
    async fn download_transcript(&self, uri: &str) -> Result<String> {
        let response = self
            .http
            .get(uri)
            .send()
            .await
            .context("Failed to download transcript")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download transcript: HTTP {}", response.status());
        }

        let content = response
            .text()
            .await
            .context("Failed to read transcript content")?;

        parse_transcript(&content)
    }

    /// Clean up S3 object
    async fn cleanup_s3(&self, s3_key: &str) {
        tracing::debug!("Cleaning up S3 object: {}", s3_key);

        let result = self
            .s3_client
            .delete_object()
            .bucket(&self.bucket)
            .key(s3_key)
            .send()
            .await;

        if let Err(e) = result {
            tracing::warn!("Failed to clean up S3 object {}: {}", s3_key, e);
        }
    }

    async fn run_job(&self, s3_key: &str) -> Result<String> {
        let job_name = self.start_transcription_job(s3_key).await?;
        let uri = with_timeout(self.timeout, "transcription job", self.wait_for_completion(&job_name)).await?;
        self.download_transcript(&uri).await
    }
}

fn parse_transcript(json: &str) -> Result<String> {
    let transcript: AwsTranscript =
        serde_json::from_str(json).context("Failed to parse transcript JSON")?;

    Ok(transcript
        .results
        .transcripts
        .into_iter()
        .next()
        .map(|t| t.transcript)
        .unwrap_or_default())
}

#[async_trait]
impl SpeechToText for AwsTranscriber {
    async fn recognize(&self, audio: &Path) -> Result<String, RecognitionError> {
        let s3_key = self
            .upload_to_s3(audio)
            .await
            .map_err(RecognitionError::Request)?;

        let result = self.run_job(&s3_key).await;
        self.cleanup_s3(&s3_key).await;

        let text = result.map_err(RecognitionError::Request)?;
        if text.trim().is_empty() {
            return Err(RecognitionError::Unrecognized);
        }
        Ok(text)
    }
}
