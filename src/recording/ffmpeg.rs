//! Re-encoding recordings with ffmpeg before upload.
//!
//! Captures are sealed as WAV. The configured output format (for example
//! `"aac -b:a 64k"`) is applied on the way to the transcription endpoint, and the
//! raw WAV is uploaded unchanged when the format is `wav` or ffmpeg is missing.
//! Files that are not WAV are already compressed and are uploaded as they are.
//! ffmpeg runs as an async child process so the record screen keeps drawing
//! while it encodes.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// An audio file ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    pub path: PathBuf,
    pub mime_type: &'static str,
    /// Whether `path` is a temporary file that the caller should remove.
    pub temporary: bool,
}

/// Maps a codec name to the file extension ffmpeg should produce.
pub fn extension_for_codec(codec: &str) -> &str {
    match codec {
        "libopus" | "libvorbis" => "ogg",
        "flac" => "flac",
        "aac" => "m4a",
        "pcm_s16le" | "wav" => "wav",
        "libmp3lame" => "mp3",
        other => other,
    }
}

/// MIME type for an audio file extension.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "m4a" => "audio/m4a",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

/// Prepares `input` for upload according to `format` (`"codec [ffmpeg options]"`).
///
/// Falls back to the original file when no conversion is needed or possible.
pub async fn encode_for_upload(input: &Path, format: &str) -> EncodedAudio {
    if !needs_conversion(input, format) {
        return original(input);
    }

    match find_ffmpeg().await {
        Ok(ffmpeg) => encode_with(&ffmpeg, input, format).await,
        Err(e) => {
            tracing::warn!("Uploading WAV without re-encoding: {}", e);
            original(input)
        }
    }
}

/// Like [`encode_for_upload`], with an explicit ffmpeg binary.
pub async fn encode_with(ffmpeg: &Path, input: &Path, format: &str) -> EncodedAudio {
    if !needs_conversion(input, format) {
        return original(input);
    }

    match convert(ffmpeg, input, format).await {
        Ok(path) => {
            let codec = format.split_whitespace().next().unwrap_or("wav");
            EncodedAudio {
                path,
                mime_type: mime_for_extension(extension_for_codec(codec)),
                temporary: true,
            }
        }
        Err(e) => {
            tracing::warn!("Uploading WAV without re-encoding: {}", e);
            original(input)
        }
    }
}

fn needs_conversion(input: &Path, format: &str) -> bool {
    let is_wav = input
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    let codec = format.split_whitespace().next().unwrap_or("wav");
    is_wav && extension_for_codec(codec) != "wav"
}

fn original(input: &Path) -> EncodedAudio {
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("wav")
        .to_ascii_lowercase();
    EncodedAudio {
        path: input.to_path_buf(),
        mime_type: mime_for_extension(&extension),
        temporary: false,
    }
}

/// Converts `input` with ffmpeg, returning the path of the converted file.
///
/// # Errors
/// - If the format string is empty
/// - If ffmpeg cannot be started
/// - If ffmpeg exits unsuccessfully
async fn convert(ffmpeg: &Path, input: &Path, format: &str) -> Result<PathBuf> {
    let format_parts: Vec<&str> = format.split_whitespace().collect();
    let Some((&codec, options)) = format_parts.split_first() else {
        return Err(anyhow!("Invalid format string: empty"));
    };

    let output = input.with_extension(format!("upload.{}", extension_for_codec(codec)));

    let mut cmd = Command::new(ffmpeg);
    cmd.arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(input)
        .arg("-acodec")
        .arg(codec)
        .arg("-ac")
        .arg("1")
        .arg("-y");
    cmd.args(options);
    cmd.arg(&output);
    cmd.kill_on_drop(true);

    let result = cmd.output().await?;
    if result.status.success() {
        tracing::debug!("Audio converted to {} at {}", codec, output.display());
        Ok(output)
    } else {
        let error_msg = String::from_utf8_lossy(&result.stderr);
        tracing::error!("ffmpeg conversion failed: {}", error_msg);
        Err(anyhow!("Audio encoding failed: {error_msg}"))
    }
}

/// Locates the ffmpeg binary, checking common install locations before PATH.
pub async fn find_ffmpeg() -> Result<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/opt/homebrew/bin/ffmpeg",
            "/usr/local/bin/ffmpeg",
            "/usr/bin/ffmpeg",
        ]
    } else if cfg!(target_os = "linux") {
        &["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/snap/bin/ffmpeg"]
    } else {
        &[]
    };

    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        tracing::debug!("Found ffmpeg at: {}", path.display());
        return Ok(path);
    }

    let search_cmd = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };
    let output = Command::new(search_cmd)
        .arg("ffmpeg")
        .output()
        .await
        .map_err(|e| anyhow!("Failed to search PATH for ffmpeg: {e}"))?;

    if output.status.success() {
        let path = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        if !path.as_os_str().is_empty() {
            return Ok(path);
        }
    }

    Err(anyhow!("ffmpeg not found; recordings will be uploaded as WAV"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_extension_for_codec() {
        assert_eq!(extension_for_codec("aac"), "m4a");
        assert_eq!(extension_for_codec("libopus"), "ogg");
        assert_eq!(extension_for_codec("pcm_s16le"), "wav");
        assert_eq!(extension_for_codec("mp3"), "mp3");
    }

    #[tokio::test]
    async fn test_wav_format_skips_conversion() {
        let encoded = encode_for_upload(Path::new("/tmp/entry.wav"), "wav").await;
        assert_eq!(encoded.path, PathBuf::from("/tmp/entry.wav"));
        assert_eq!(encoded.mime_type, "audio/wav");
        assert!(!encoded.temporary);
    }

    #[tokio::test]
    async fn test_compressed_input_is_uploaded_as_is() {
        let encoded = encode_for_upload(Path::new("/tmp/memo.m4a"), "aac -b:a 64k").await;
        assert_eq!(encoded.path, PathBuf::from("/tmp/memo.m4a"));
        assert_eq!(encoded.mime_type, "audio/m4a");
        assert!(!encoded.temporary);
    }

    #[tokio::test]
    async fn test_failed_conversion_falls_back_to_original() {
        // The input does not exist, so ffmpeg (if installed) fails too.
        let encoded =
            encode_for_upload(Path::new("/nonexistent/orb-entry.wav"), "aac -b:a 64k").await;
        assert_eq!(encoded.path, PathBuf::from("/nonexistent/orb-entry.wav"));
        assert!(!encoded.temporary);
    }

    #[tokio::test]
    async fn test_missing_binary_falls_back_to_original() {
        let encoded = encode_with(
            Path::new("/nonexistent/ffmpeg"),
            Path::new("/tmp/entry.wav"),
            "aac -b:a 64k",
        )
        .await;
        assert_eq!(encoded.path, PathBuf::from("/tmp/entry.wav"));
        assert!(!encoded.temporary);
    }

    /// Writes a stand-in ffmpeg that sleeps, then touches its last argument.
    #[cfg(unix)]
    fn slow_ffmpeg(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(
            &path,
            "#!/bin/sh\nsleep 0.3\nfor last; do :; done\ntouch \"$last\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_encoding_does_not_block_other_work_on_the_task() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = slow_ffmpeg(dir.path());
        let input = dir.path().join("entry.wav");
        std::fs::write(&input, b"RIFF").unwrap();

        let done = Cell::new(false);
        let frames = Cell::new(0u32);
        let encode = async {
            let encoded = encode_with(&ffmpeg, &input, "aac -b:a 64k").await;
            done.set(true);
            encoded
        };
        let screen = async {
            while !done.get() {
                tokio::time::sleep(Duration::from_millis(10)).await;
                frames.set(frames.get() + 1);
            }
        };
        let (encoded, ()) = tokio::join!(encode, screen);

        assert!(encoded.temporary);
        assert_eq!(encoded.path, dir.path().join("entry.upload.m4a"));
        assert_eq!(encoded.mime_type, "audio/m4a");
        assert!(
            frames.get() >= 10,
            "only {} frames drawn while encoding",
            frames.get()
        );
    }
}
