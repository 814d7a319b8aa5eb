use async_trait::async_trait;
use std::path::Path;

pub mod aws;

pub use aws::AwsTranscriber;

/// Why a speech engine produced no text
#[derive(thiserror::Error, Debug)]
pub enum RecognitionError {
    #[error("speech could not be recognized")]
    Unrecognized,

    #[error("could not request results: {0:#}")]
    Request(anyhow::Error),
}

/// Speech-to-text engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn recognize(&self, audio: &Path) -> Result<String, RecognitionError>;
}

/// Turn an audio file into a transcript.
///
/// Never fails: unrecognizable speech and engine/transport failures both
/// come back as an empty transcript after being logged, and the caller
/// stops the item there.
pub async fn transcribe_audio(engine: &dyn SpeechToText, audio: &Path) -> String {
    tracing::info!("Transcribing audio...");

    match engine.recognize(audio).await {
        Ok(text) if !text.trim().is_empty() => {
            tracing::info!(chars = text.len(), "Transcription completed");
            text
        }
        Ok(_) | Err(RecognitionError::Unrecognized) => {
            tracing::warn!("Speech recognition could not understand the audio");
            String::new()
        }
        Err(RecognitionError::Request(e)) => {
            tracing::error!("Could not request transcription results: {:#}", e);
            String::new()
        }
    }
}
