//! Structured logging for orb using the tracing crate.
//!
//! Logs go to a daily-rotated file under the XDG state directory and never to
//! the terminal, which belongs to the TUI. Only the 7 most recent log files are
//! kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

/// File name prefix of the rolling log.
pub const LOG_FILE_PREFIX: &str = "orb.log";

const MAX_LOG_FILES: usize = 7;

/// Keeps the non-blocking writer alive for the program lifetime.
static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initializes file logging.
///
/// The level comes from `RUST_LOG` and defaults to `info`.
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> Result<(), anyhow::Error> {
    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;

    if let Err(e) = cleanup_old_logs(&log_dir) {
        eprintln!("Warning: Failed to cleanup old logs: {e}");
    }

    let file_appender = rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging initialized. Log directory: {}", log_dir.display());
    Ok(())
}

/// `$XDG_STATE_HOME/orb`, or `~/.local/state/orb`.
pub fn log_dir() -> Result<PathBuf, anyhow::Error> {
    let xdg_state = std::env::var_os("XDG_STATE_HOME").map(PathBuf::from);
    match (xdg_state, dirs::home_dir()) {
        (Some(state), _) if !state.as_os_str().is_empty() => Ok(state.join("orb")),
        (_, Some(home)) => Ok(home.join(".local").join("state").join("orb")),
        _ => Err(anyhow::anyhow!("Could not determine home directory")),
    }
}

/// Rotated log files (`orb.log.YYYY-MM-DD`) in `log_dir`, newest first.
pub fn rotated_logs(log_dir: &Path) -> Result<Vec<PathBuf>, anyhow::Error> {
    let mut log_files: Vec<(PathBuf, SystemTime)> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let file_name = path.file_name()?.to_string_lossy().to_string();
            let date = file_name.strip_prefix(LOG_FILE_PREFIX)?.strip_prefix('.')?;
            if date.matches('-').count() != 2 {
                return None;
            }
            let modified = fs::metadata(&path).ok()?.modified().ok()?;
            Some((path, modified))
        })
        .collect();

    // Names sort by date; modification time breaks ties for same-day copies.
    log_files.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    Ok(log_files.into_iter().map(|(path, _)| path).collect())
}

fn cleanup_old_logs(log_dir: &Path) -> Result<(), anyhow::Error> {
    for path in rotated_logs(log_dir)?.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete old log file {}: {}", path.display(), e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "line\n").unwrap();
    }

    #[test]
    fn test_rotated_logs_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "orb.log.2026-01-02");
        touch(dir.path(), "orb.log.2026-01-03");
        touch(dir.path(), "orb.log");
        touch(dir.path(), "other.log.2026-01-04");
        touch(dir.path(), "orb.logfile.2026-01-04");

        let names: Vec<String> = rotated_logs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["orb.log.2026-01-03", "orb.log.2026-01-02"]);
    }

    #[test]
    fn test_cleanup_keeps_seven_newest() {
        let dir = TempDir::new().unwrap();
        for day in 1..=10 {
            touch(dir.path(), &format!("orb.log.2026-03-{day:02}"));
        }

        cleanup_old_logs(dir.path()).unwrap();

        let remaining = rotated_logs(dir.path()).unwrap();
        assert_eq!(remaining.len(), MAX_LOG_FILES);
        assert!(dir.path().join("orb.log.2026-03-10").exists());
        assert!(dir.path().join("orb.log.2026-03-04").exists());
        assert!(!dir.path().join("orb.log.2026-03-03").exists());
    }
}
