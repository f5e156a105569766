//! Journal history viewer.

use crate::clipboard::copy_to_clipboard;
use crate::config::data_dir;
use crate::history::{HistoryManager, HistoryViewer};

/// Shows past journal entries and copies the selected transcription.
///
/// # Errors
/// - If the data directory cannot be determined
/// - If the history database cannot be read
pub async fn handle_history() -> Result<(), anyhow::Error> {
    tracing::info!("=== orb History Viewer ===");

    let mut history_manager = HistoryManager::new(&data_dir()?)?;
    let entries = history_manager.get_all_entries()?;

    if entries.is_empty() {
        println!("No journal entries yet. Run 'orb' to record one.");
        return Ok(());
    }

    let mut viewer = HistoryViewer::new(entries)?;
    match viewer.run()? {
        Some(transcription) => {
            if copy_to_clipboard(&transcription)? {
                tracing::info!("Selected transcription copied to clipboard");
            }
        }
        None => tracing::debug!("History viewer exited without selection"),
    }

    Ok(())
}
