//! Configuration file management for orb.
//!
//! Configuration lives in `~/.config/orb/orb.toml` and is created with defaults
//! the first time any command needs it.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::recording::level::{LevelNormalizer, DEFAULT_NOISE_FLOOR_DB, DEFAULT_VOICE_THRESHOLD_DB};
use crate::recording::recorder::TickTiming;
use crate::ui::reveal::DEFAULT_WORD_DELAY;
use crate::ui::scrub::DEFAULT_TARGET_SECS;

/// Audio capture and metering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `orb list-devices`
    /// - device name from `orb list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Requested sample rate in Hz (the device rate wins if they differ)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Level in dBFS that reads as zero intensity
    #[serde(default = "default_noise_floor_db")]
    pub noise_floor_db: f32,
    /// Level in dBFS where speech starts; must sit above the noise floor
    #[serde(default = "default_voice_threshold_db")]
    pub voice_threshold_db: f32,
    /// Milliseconds between level samples
    #[serde(default = "default_level_interval_ms")]
    pub level_interval_ms: u64,
    /// Milliseconds between elapsed-time updates
    #[serde(default = "default_duration_interval_ms")]
    pub duration_interval_ms: u64,
    /// Upload format string: "codec [ffmpeg_options]" (e.g., "aac -b:a 64k"), or "wav"
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_noise_floor_db() -> f32 {
    DEFAULT_NOISE_FLOOR_DB
}

fn default_voice_threshold_db() -> f32 {
    DEFAULT_VOICE_THRESHOLD_DB
}

fn default_level_interval_ms() -> u64 {
    50
}

fn default_duration_interval_ms() -> u64 {
    100
}

fn default_output_format() -> String {
    "aac -b:a 64k".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
            noise_floor_db: default_noise_floor_db(),
            voice_threshold_db: default_voice_threshold_db(),
            level_interval_ms: default_level_interval_ms(),
            duration_interval_ms: default_duration_interval_ms(),
            output_format: default_output_format(),
        }
    }
}

impl AudioConfig {
    /// Level normalizer for the configured calibration.
    ///
    /// # Errors
    /// - If the voice threshold is not strictly between the noise floor and 0 dBFS
    pub fn normalizer(&self) -> anyhow::Result<LevelNormalizer> {
        LevelNormalizer::new(self.noise_floor_db, self.voice_threshold_db).ok_or_else(|| {
            anyhow!(
                "Invalid level calibration: need noise_floor_db < voice_threshold_db < 0 (got {} and {})",
                self.noise_floor_db,
                self.voice_threshold_db
            )
        })
    }

    /// Tick periods for the recorder.
    ///
    /// # Errors
    /// - If either interval is zero
    pub fn tick_timing(&self) -> anyhow::Result<TickTiming> {
        if self.level_interval_ms == 0 || self.duration_interval_ms == 0 {
            return Err(anyhow!("Tick intervals must be greater than zero"));
        }
        Ok(TickTiming {
            level: Duration::from_millis(self.level_interval_ms),
            duration: Duration::from_millis(self.duration_interval_ms),
        })
    }
}

/// Backend project the edge functions and auth endpoints live under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. "https://<project>.supabase.co"
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// Public anon key sent as the `apikey` header
    #[serde(default)]
    pub anon_key: String,
}

fn default_backend_url() -> String {
    "https://smyoggxvfhlcjleqhnvg.supabase.co".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            anon_key: String::new(),
        }
    }
}

impl BackendConfig {
    /// Fails with a pointer to the config file if no anon key has been set.
    pub fn ensure_configured(&self) -> anyhow::Result<()> {
        if self.anon_key.trim().is_empty() {
            return Err(anyhow!(
                "backend.anon_key is not set. Add your project's anon key to ~/.config/orb/orb.toml (run 'orb config')"
            ));
        }
        Ok(())
    }
}

/// Presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Target session length shown on the scrub bar, in seconds
    #[serde(default = "default_target_duration_secs")]
    pub target_duration_secs: u64,
    /// Delay between revealed words of the orb's response, in milliseconds
    #[serde(default = "default_word_delay_ms")]
    pub word_delay_ms: u64,
}

fn default_target_duration_secs() -> u64 {
    DEFAULT_TARGET_SECS as u64
}

fn default_word_delay_ms() -> u64 {
    DEFAULT_WORD_DELAY.as_millis() as u64
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            target_duration_secs: default_target_duration_secs(),
            word_delay_ms: default_word_delay_ms(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrbConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl OrbConfig {
    /// Loads configuration from the user's config directory, writing the
    /// defaults there first if no file exists yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be read or written
    /// - If the TOML is malformed or the values are inconsistent
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("No configuration found, writing defaults to {}", path.display());
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: OrbConfig =
            toml::from_str(&content).with_context(|| format!("Malformed {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.audio.normalizer()?;
        self.audio.tick_timing()?;
        if self.backend.url.trim().is_empty() {
            return Err(anyhow!("backend.url must not be empty"));
        }
        Ok(())
    }
}

/// `~/.config/orb`, created on demand.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".config")
        .join("orb");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `~/.local/share/orb`, created on demand. Holds recordings, history and the session.
pub fn data_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".local")
        .join("share")
        .join("orb");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Path of the main configuration file.
pub fn config_path() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join("orb.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("orb.toml");

        let config = OrbConfig::load_from(&path).unwrap();
        assert_eq!(config, OrbConfig::default());
        assert!(path.exists());
        assert_eq!(OrbConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orb.toml");
        fs::write(&path, "[audio]\ndevice = \"1\"\nvoice_threshold_db = -30.0\n").unwrap();

        let config = OrbConfig::load_from(&path).unwrap();
        assert_eq!(config.audio.device, "1");
        assert_eq!(config.audio.voice_threshold_db, -30.0);
        assert_eq!(config.audio.noise_floor_db, -45.0);
        assert_eq!(config.audio.level_interval_ms, 50);
        assert_eq!(config.display.target_duration_secs, 300);
    }

    #[test]
    fn test_inverted_calibration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orb.toml");
        fs::write(
            &path,
            "[audio]\nnoise_floor_db = -35.0\nvoice_threshold_db = -45.0\n",
        )
        .unwrap();

        let err = OrbConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("calibration"));
    }

    #[test]
    fn test_backend_section_keeps_default_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orb.toml");
        fs::write(&path, "[backend]\nanon_key = \"public-key\"\n").unwrap();

        let config = OrbConfig::load_from(&path).unwrap();
        assert_eq!(config.backend.url, BackendConfig::default().url);
        assert!(config.backend.ensure_configured().is_ok());
        assert!(BackendConfig::default().ensure_configured().is_err());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = OrbConfig::default();
        config.audio.duration_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_timing_defaults() {
        let timing = AudioConfig::default().tick_timing().unwrap();
        assert_eq!(timing, TickTiming::default());
    }
}
