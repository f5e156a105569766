//! Turn an existing audio file into a journal entry without recording.
//!
//! The file goes through the same upload pipeline as `record`; only the live
//! screen is skipped.

use std::path::{Path, PathBuf};

use crate::backend::EdgeFunctionClient;
use crate::config::{data_dir, OrbConfig};
use crate::history::HistoryManager;
use crate::journal::process_audio;

/// Processes `file` and prints the transcription, title and response.
///
/// # Errors
/// - If the file does not exist
/// - If the user is not signed in
/// - If transcription or analysis fails
pub async fn handle_transcribe(file: PathBuf) -> Result<(), anyhow::Error> {
    tracing::info!("=== orb Transcribe Command ===");

    if !file.exists() {
        return Err(anyhow::anyhow!("Audio file not found: {}", file.display()));
    }
    tracing::info!("Processing file: {}", file.display());

    let config = OrbConfig::load()?;
    let session = super::auth::active_session(&config).await?;
    let backend = EdgeFunctionClient::new(
        &config.backend.url,
        &config.backend.anon_key,
        &session.access_token,
    );

    let duration_secs = wav_duration_secs(&file).unwrap_or(0.0);
    let outcome = process_audio(
        &backend,
        &file,
        duration_secs,
        &config.audio.output_format,
        |stage| tracing::debug!("Processing stage: {:?}", stage),
    )
    .await;

    if let Some(error) = outcome.error {
        return Err(anyhow::anyhow!(error));
    }

    if let Some(entry) = &outcome.entry {
        match HistoryManager::new(&data_dir()?).and_then(|mut h| h.save_entry(entry)) {
            Ok(id) => tracing::info!("Journal entry {} saved", id),
            Err(e) => tracing::warn!("Failed to save entry to history: {}", e),
        }
        println!("{}", entry.title);
        println!();
        println!("{}", entry.transcription);
        println!();
        println!("{}", entry.response);
    }

    Ok(())
}

/// Length of a WAV file in seconds, or `None` for anything hound cannot read.
fn wav_duration_secs(path: &Path) -> Option<f64> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wav_duration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("two_seconds.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..16_000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        assert_eq!(wav_duration_secs(&path), Some(2.0));
    }

    #[test]
    fn test_non_wav_has_no_duration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memo.ogg");
        std::fs::write(&path, b"OggS not really").unwrap();
        assert_eq!(wav_duration_secs(&path), None);
    }
}
