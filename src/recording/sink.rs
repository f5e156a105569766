//! Capture sink and permission seams used by the recording controller.
//!
//! A [`CaptureSink`] opens one [`Capture`] per recording session. The capture is
//! owned by the controller while recording and is consumed by either
//! [`Capture::seal`] (producing an [`AssetHandle`]) or [`Capture::discard`].

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Recoverable failures of the `start` transition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Microphone permission was denied")]
    PermissionDenied,
    #[error("Audio input device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Source of capture sessions, one per recording.
pub trait CaptureSink {
    type Capture: Capture;

    /// Opens a capture that will write its audio to `path` when sealed.
    fn open(&mut self, path: &Path) -> Result<Self::Capture, RecorderError>;
}

/// An open capture session.
pub trait Capture {
    /// Current loudness in dBFS.
    fn read_level(&self) -> f32;

    /// Finalizes the recording and hands the audio over to the caller.
    fn seal(self, duration_secs: f64) -> AssetHandle;

    /// Drops the recording without producing an asset.
    fn discard(self);
}

/// Microphone permission as granted by the platform.
#[async_trait::async_trait]
pub trait PermissionProvider: Send + Sync {
    fn is_granted(&self) -> bool;

    /// Asks the platform for permission, resolving to the resulting grant.
    async fn request(&self) -> bool;
}

/// A sealed recording, exclusively owned by whoever holds it.
#[derive(Debug, PartialEq)]
pub struct AssetHandle {
    path: PathBuf,
    duration_secs: f64,
    sample_rate: u32,
}

impl AssetHandle {
    pub fn new(path: PathBuf, duration_secs: f64, sample_rate: u32) -> Self {
        Self {
            path,
            duration_secs,
            sample_rate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Releases the asset and deletes the audio file.
    pub fn discard(self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!("Failed to remove recording {}: {}", self.path.display(), e);
        } else {
            tracing::debug!("Discarded recording {}", self.path.display());
        }
    }
}
