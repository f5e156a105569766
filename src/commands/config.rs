//! Configuration file editor command.

use std::process::Command;

use crate::config::{config_path, OrbConfig};

/// Opens `orb.toml` in the user's editor and validates the result.
///
/// The file is created with defaults first if it does not exist. Editors are
/// tried in order: `$EDITOR`, nano, vi.
///
/// # Errors
/// - If no editor can be found or it exits unsuccessfully
/// - If the edited file no longer parses or validates
pub fn handle_config() -> anyhow::Result<()> {
    let config_path = config_path()?;
    if !config_path.exists() {
        OrbConfig::default().save_to(&config_path)?;
    }

    tracing::info!("Opening config file: {}", config_path.display());

    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible."
            )
        })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    OrbConfig::load_from(&config_path)
        .map_err(|e| anyhow::anyhow!("Configuration saved but invalid: {e:#}"))?;
    tracing::info!("Config file edited successfully");
    Ok(())
}

fn find_editor() -> anyhow::Result<String> {
    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.is_empty() {
            return Ok(editor);
        }
    }

    for editor in ["nano", "vi"] {
        if is_editor_available(editor) {
            return Ok(editor.to_string());
        }
    }

    Err(anyhow::anyhow!(
        "No editor found. Please set the $EDITOR environment variable."
    ))
}

fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
