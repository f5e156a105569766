//! Microphone capture through cpal.
//!
//! This module implements the capture sink on top of the system audio host.
//! Audio is captured from the configured input device at its native rate,
//! mixed down to mono i16 and kept in memory until the capture is sealed into a
//! WAV file or discarded.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use hound::WavWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::level::rms_dbfs;
use super::sink::{AssetHandle, Capture, CaptureSink, PermissionProvider, RecorderError};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

type SampleBuffer = Arc<Mutex<Vec<i16>>>;

/// Opens captures on a specified or default input device.
pub struct CpalSink {
    /// Device name, numeric index, or "default"
    device_name: String,
    /// Sample rate requested in the configuration
    requested_sample_rate: u32,
}

impl CpalSink {
    pub fn new(device_name: String, requested_sample_rate: u32) -> Self {
        Self {
            device_name,
            requested_sample_rate,
        }
    }
}

impl CaptureSink for CpalSink {
    type Capture = CpalCapture;

    fn open(&mut self, path: &Path) -> Result<CpalCapture, RecorderError> {
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            if self.device_name == "default" {
                host.default_input_device()
                    .ok_or_else(|| anyhow!("No audio input device available"))
            } else {
                find_device_by_name(&host, &self.device_name)
            }
        })
        .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RecorderError::DeviceUnavailable(format!(
                    "Cannot create recordings directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        CpalCapture::start(&device, self.requested_sample_rate, path.to_path_buf())
            .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))
    }
}

/// A live cpal input stream and the samples it has produced so far.
pub struct CpalCapture {
    /// Active input stream; dropping it stops capture
    stream: Option<cpal::Stream>,
    /// Recorded audio samples (i16 PCM mono)
    samples: SampleBuffer,
    /// Actual recording sample rate from device
    sample_rate: u32,
    /// Where the WAV is written when sealed
    path: PathBuf,
}

impl CpalCapture {
    fn start(device: &cpal::Device, requested_sample_rate: u32, path: PathBuf) -> Result<Self> {
        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Recording device: {}", device_name);

        let device_config = device.default_input_config()?;
        let sample_rate = device_config.sample_rate().0;
        let channels = device_config.channels() as usize;
        let sample_format = device_config.sample_format();

        if sample_rate != requested_sample_rate {
            tracing::warn!(
                "Requested sample rate {}Hz but device uses {}Hz. Recording at device rate.",
                requested_sample_rate,
                sample_rate
            );
        }
        tracing::debug!(
            "Device configuration: {}Hz, {} channels, {:?}",
            sample_rate,
            channels,
            sample_format
        );

        let samples: SampleBuffer = Arc::new(Mutex::new(Vec::new()));
        let config: cpal::StreamConfig = device_config.into();

        let stream = match sample_format {
            cpal::SampleFormat::I16 => build_stream::<i16>(device, &config, &samples, channels)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(device, &config, &samples, channels)?,
            cpal::SampleFormat::I32 => build_stream::<i32>(device, &config, &samples, channels)?,
            cpal::SampleFormat::F32 => build_stream::<f32>(device, &config, &samples, channels)?,
            other => return Err(anyhow!("Unsupported sample format: {other:?}")),
        };
        stream.play()?;
        tracing::debug!("Audio stream started");

        Ok(Self {
            stream: Some(stream),
            samples,
            sample_rate,
            path,
        })
    }

    fn samples(&self) -> MutexGuard<'_, Vec<i16>> {
        lock(&self.samples)
    }

    /// Writes the captured samples as a 16-bit mono WAV.
    fn write_wav(&self, samples: &[i16]) -> Result<()> {
        let wav_spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = WavWriter::create(&self.path, wav_spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

impl Capture for CpalCapture {
    /// RMS of the last 50ms of audio in dBFS.
    fn read_level(&self) -> f32 {
        let window = (self.sample_rate / 20) as usize;
        rms_dbfs(&self.samples(), window)
    }

    fn seal(mut self, duration_secs: f64) -> AssetHandle {
        self.stream = None;

        let samples = std::mem::take(&mut *self.samples());
        tracing::info!(
            "Capture sealed: {} samples at {}Hz ({:.2}s)",
            samples.len(),
            self.sample_rate,
            samples.len() as f64 / self.sample_rate as f64
        );

        if samples.is_empty() {
            tracing::warn!("Recording stopped with no samples captured");
        }
        match self.write_wav(&samples) {
            Ok(()) => tracing::debug!("Recording written: {}", self.path.display()),
            Err(e) => tracing::error!("Failed to write recording {}: {}", self.path.display(), e),
        }

        AssetHandle::new(self.path.clone(), duration_secs, self.sample_rate)
    }

    fn discard(mut self) {
        self.stream = None;
        self.samples().clear();
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::debug!("Failed to remove partial recording: {}", e);
            }
        }
        tracing::debug!("Capture discarded");
    }
}

/// Desktop stand-in for the platform microphone permission.
///
/// Desktop hosts grant access at the OS level when the stream is opened, so
/// permission here means "an input device can be enumerated".
pub struct DevicePermission {
    device_name: String,
}

impl DevicePermission {
    pub fn new(device_name: String) -> Self {
        Self { device_name }
    }

    fn probe(&self) -> bool {
        let device_name = self.device_name.clone();
        suppress_alsa_warnings(move || {
            let host = cpal::default_host();
            if device_name == "default" {
                Ok(host.default_input_device().is_some())
            } else {
                Ok(find_device_by_name(&host, &device_name).is_ok())
            }
        })
        .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl PermissionProvider for DevicePermission {
    fn is_granted(&self) -> bool {
        self.probe()
    }

    async fn request(&self) -> bool {
        let granted = self.probe();
        tracing::info!("Microphone access {}", if granted { "granted" } else { "denied" });
        granted
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: &SampleBuffer,
    channels: usize,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let samples = Arc::clone(samples);
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            mix_to_mono(data, channels, &mut lock(&samples));
        },
        |err| {
            tracing::error!("Audio stream error: {}", err);
        },
        None,
    )?;
    Ok(stream)
}

/// Appends interleaved frames to `out`, averaging channels into one.
fn mix_to_mono<T>(data: &[T], channels: usize, out: &mut Vec<i16>)
where
    T: Sample,
    i16: FromSample<T>,
{
    match channels {
        0 => {}
        1 => out.extend(data.iter().map(|&s| s.to_sample::<i16>())),
        _ => {
            for frame in data.chunks_exact(channels) {
                let sum: i32 = frame.iter().map(|&s| s.to_sample::<i16>() as i32).sum();
                out.push((sum / channels as i32) as i16);
            }
        }
    }
}

fn lock(samples: &SampleBuffer) -> MutexGuard<'_, Vec<i16>> {
    samples.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Finds an audio input device by name or numeric index.
///
/// # Errors
/// - If no device with the specified name/index is found
pub(crate) fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    if let Ok(index) = device_spec.parse::<usize>() {
        let mut devices: Vec<_> = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
            .collect();
        let count = devices.len();

        if index < count {
            return Ok(devices.swap_remove(index));
        }
        return Err(anyhow!(
            "Device index {} is out of range (0-{})",
            index,
            count.saturating_sub(1)
        ));
    }

    let devices = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;

    for device in devices {
        if device.name().is_ok_and(|name| name == device_spec) {
            return Ok(device);
        }
    }

    Err(anyhow!(
        "Audio input device '{device_spec}' not found. Use 'orb list-devices' to see available devices."
    ))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
#[cfg(target_os = "linux")]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// ALSA only exists on Linux.
#[cfg(not(target_os = "linux"))]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_to_mono_averages_channels() {
        let mut out = Vec::new();
        mix_to_mono(&[100i16, 300, -50, 50], 2, &mut out);
        assert_eq!(out, vec![200, 0]);

        let mut out = Vec::new();
        mix_to_mono(&[1i16, 2, 3], 1, &mut out);
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn test_mix_to_mono_converts_float_samples() {
        let mut out = Vec::new();
        mix_to_mono(&[0.0f32, 0.0, 1.0, 1.0], 2, &mut out);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], i16::MAX);
    }

    #[test]
    fn test_mix_to_mono_drops_partial_frame() {
        let mut out = Vec::new();
        mix_to_mono(&[10i16, 20, 30, 40, 50], 3, &mut out);
        assert_eq!(out, vec![20]);
    }
}
