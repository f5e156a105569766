//! List available audio input devices.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::config::OrbConfig;
use crate::recording::audio::suppress_alsa_warnings;

/// One enumerated input device.
struct DeviceInfo {
    name: String,
    config: Option<(u32, u16)>,
}

/// Prints every input device with the index usable as `audio.device`.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    let (default_name, devices) = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices: Vec<DeviceInfo> = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?
            .map(|device| DeviceInfo {
                name: device.name().unwrap_or_else(|_| "Unknown".to_string()),
                config: device
                    .default_input_config()
                    .ok()
                    .map(|c| (c.sample_rate().0, c.channels())),
            })
            .collect();
        Ok((default_name, devices))
    })?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    let configured = OrbConfig::load()
        .map(|config| config.audio.device)
        .unwrap_or_else(|_| "default".to_string());

    println!();
    println!("Available audio input devices:");
    println!();

    for (index, device) in devices.iter().enumerate() {
        let mut tags = Vec::new();
        if default_name.as_deref() == Some(device.name.as_str()) {
            tags.push("DEFAULT");
        }
        if configured == index.to_string() || configured == device.name {
            tags.push("CONFIGURED");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };

        let config_info = match device.config {
            Some((sample_rate, channels)) => format!("{sample_rate}Hz, {channels} channels"),
            None => "configuration unavailable".to_string(),
        };

        println!("  ID: {index}");
        println!("    Name: {}{}", device.name, tags);
        println!("    Config: {config_info}");
        println!();
    }

    println!("Set `device` under [audio] in ~/.config/orb/orb.toml to an ID or name.");
    Ok(())
}
