//! Copying journal text to the system clipboard.
//!
//! Uses pbcopy on macOS, otherwise wl-copy (Wayland) and then xclip (X11).

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// Clipboard programs tried in order, with their arguments.
fn clipboard_tools() -> &'static [(&'static str, &'static [&'static str])] {
    if cfg!(target_os = "macos") {
        &[("pbcopy", &[])]
    } else {
        &[
            ("wl-copy", &["--type", "text/plain", "--trim-newline"]),
            ("xclip", &["-selection", "clipboard", "-in", "-quiet"]),
        ]
    }
}

/// Copies `text` to the clipboard with the first tool that accepts it.
///
/// A missing clipboard tool is logged rather than returned as an error, so
/// callers can treat copying as best effort.
pub fn copy_to_clipboard(text: &str) -> anyhow::Result<bool> {
    for (program, args) in clipboard_tools() {
        let Ok(mut child) = Command::new(program)
            .args(*args)
            .stdin(Stdio::piped())
            .spawn()
        else {
            tracing::debug!("{} not found or not executable", program);
            continue;
        };

        let Some(mut stdin) = child.stdin.take() else {
            continue;
        };
        match write!(stdin, "{text}") {
            Ok(()) => {
                drop(stdin);
                // Give the tool a moment to take ownership of the selection.
                thread::sleep(Duration::from_millis(100));
                tracing::debug!("Copied {} bytes to clipboard via {}", text.len(), program);
                return Ok(true);
            }
            Err(e) => tracing::warn!("Failed to write to {} stdin: {}", program, e),
        }
    }

    let names: Vec<&str> = clipboard_tools().iter().map(|(name, _)| *name).collect();
    tracing::warn!("No clipboard tool available ({} not found)", names.join(" or "));
    Ok(false)
}
