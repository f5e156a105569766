//! Turning a recording into a journal entry.
//!
//! The audio is transcribed, the transcription is given a title and sentiment,
//! and finally the orb asks a follow-up question. Transcription and analysis
//! failures end the pipeline with an error; a failed follow-up only falls back
//! to the entry title.

use std::path::Path;

use super::stage::ProcessingStage;
use crate::backend::{AudioUpload, BackendError, JournalBackend};
use crate::history::NewEntry;
use crate::recording::ffmpeg::encode_for_upload;
use crate::recording::AssetHandle;

/// Error shown when stop produced no audio.
pub const NO_RECORDING: &str = "No recording found";

/// Result of running one recording through the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryOutcome {
    pub transcription: Option<String>,
    /// The orb's reply: a follow-up question or the entry title
    pub response: Option<String>,
    pub error: Option<String>,
    /// Present only when the entry was fully processed
    pub entry: Option<NewEntry>,
}

impl EntryOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Processes a sealed recording, reporting each stage through `on_stage`.
///
/// The stage always ends at `Complete`. The recording is discarded once the
/// entry is processed and kept on disk when processing fails.
pub async fn process_recording<B, F>(
    backend: &B,
    asset: Option<AssetHandle>,
    output_format: &str,
    mut on_stage: F,
) -> EntryOutcome
where
    B: JournalBackend + ?Sized,
    F: FnMut(ProcessingStage),
{
    let Some(asset) = asset else {
        tracing::warn!("Processing requested without a recording");
        on_stage(ProcessingStage::Complete);
        return EntryOutcome::failed(NO_RECORDING);
    };

    let outcome = process_audio(
        backend,
        asset.path(),
        asset.duration_secs(),
        output_format,
        &mut on_stage,
    )
    .await;

    if outcome.error.is_none() {
        asset.discard();
    } else {
        tracing::info!("Keeping recording at {}", asset.path().display());
    }
    outcome
}

/// Processes an audio file already on disk.
pub async fn process_audio<B, F>(
    backend: &B,
    path: &Path,
    duration_secs: f64,
    output_format: &str,
    mut on_stage: F,
) -> EntryOutcome
where
    B: JournalBackend + ?Sized,
    F: FnMut(ProcessingStage),
{
    on_stage(ProcessingStage::Listening);
    let transcription = match transcribe(backend, path, output_format).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Transcription failed: {}", e);
            on_stage(ProcessingStage::Complete);
            return EntryOutcome::failed(e.to_string());
        }
    };
    tracing::info!("Transcribed {} characters", transcription.len());

    on_stage(ProcessingStage::Thinking);
    let processed = match backend.process_entry(&transcription).await {
        Ok(processed) => processed,
        Err(e) => {
            tracing::error!("Processing entry failed: {}", e);
            on_stage(ProcessingStage::Complete);
            return EntryOutcome {
                transcription: Some(transcription),
                error: Some(e.to_string()),
                ..EntryOutcome::default()
            };
        }
    };

    let response = match backend
        .generate_follow_up(&transcription, &processed.title, &processed.sentiment.label)
        .await
    {
        Ok(follow_up) => follow_up.follow_up_question,
        Err(e) => {
            tracing::warn!("Follow-up generation failed, using title: {}", e);
            processed.title.clone()
        }
    };

    on_stage(ProcessingStage::Complete);
    let entry = NewEntry {
        transcription: transcription.clone(),
        title: processed.title,
        sentiment_label: processed.sentiment.label,
        sentiment_score: processed.sentiment.score,
        response: response.clone(),
        duration_secs,
    };
    EntryOutcome {
        transcription: Some(transcription),
        response: Some(response),
        error: None,
        entry: Some(entry),
    }
}

async fn transcribe<B>(backend: &B, path: &Path, output_format: &str) -> Result<String, BackendError>
where
    B: JournalBackend + ?Sized,
{
    let encoded = encode_for_upload(path, output_format).await;
    let bytes = tokio::fs::read(&encoded.path).await;
    if encoded.temporary {
        if let Err(e) = tokio::fs::remove_file(&encoded.path).await {
            tracing::debug!("Failed to remove {}: {}", encoded.path.display(), e);
        }
    }

    let file_name = encoded
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.wav".to_string());
    let upload = AudioUpload {
        bytes: bytes?,
        file_name,
        mime_type: encoded.mime_type,
    };

    Ok(backend.transcribe_audio(upload).await?.transcription)
}
