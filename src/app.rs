//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// Voice journaling from the terminal
#[derive(Parser)]
#[command(name = "orb")]
#[command(version)]
#[command(about = "Voice journaling from the terminal with a live intensity orb")]
#[command(long_about = "Voice journaling from the terminal with a live intensity orb.\n\nSpeak an entry while the orb follows your voice. The entry is transcribed,\ngiven a title and sentiment, and the orb answers with a follow-up question.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n\nEXAMPLES:\n    # Sign in with an emailed code\n    $ orb login\n    \n    # Record an entry\n    $ orb\n    \n    # Stop a running recording from a hotkey daemon\n    $ pkill -USR1 orb\n    \n    # Turn an existing voice memo into an entry\n    $ orb transcribe memo.wav\n    \n    # Browse past entries\n    $ orb history")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/orb/orb.toml\n    Journal:            ~/.local/share/orb/journal.db\n    Logs:               ~/.local/state/orb/orb.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a journal entry with the live orb (default)
    ///
    /// Recording starts immediately. Press Enter to finish the entry,
    /// Escape/q to cancel. SIGUSR1 also finishes the entry.
    #[command(visible_alias = "r")]
    Record,

    /// Sign in with a one-time code sent to your email
    Login,

    /// Sign out and forget the stored session
    Logout,

    /// Turn an existing audio file into a journal entry
    ///
    /// Examples:
    ///   orb transcribe memo.wav
    ///   orb transcribe voice-note.m4a
    #[command(visible_alias = "t")]
    Transcribe {
        /// Path to the audio file to process
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Reflect on your recent entries
    #[command(visible_alias = "i")]
    Insight,

    /// Browse journal history
    ///
    /// Use arrow keys to navigate, Enter to copy the transcription, Esc to exit.
    #[command(visible_alias = "h")]
    History,

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in orb.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   orb completions bash > orb.bash
    ///   orb completions zsh > _orb
    ///   orb completions fish > orb.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success, or login cancelled
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that don't need logging
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "orb", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => return commands::handle_list_devices(),
        Some(Commands::Logs) => return commands::handle_logs(),
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None | Some(Commands::Record) => commands::handle_record().await?,
        Some(Commands::Login) => {
            if let Err(e) = commands::handle_login().await {
                // cliclack already displayed the cancellation
                let err_msg = e.to_string();
                if err_msg.contains("cancelled") || err_msg.contains("interrupted") {
                    process::exit(0);
                }
                return Err(e);
            }
        }
        Some(Commands::Logout) => commands::handle_logout().await?,
        Some(Commands::Transcribe { file }) => commands::handle_transcribe(file).await?,
        Some(Commands::Insight) => commands::handle_insight().await?,
        Some(Commands::History) => commands::handle_history().await?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_defaults_to_record() {
        let cli = Cli::try_parse_from(["orb"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_transcribe_takes_a_file() {
        let cli = Cli::try_parse_from(["orb", "t", "memo.wav"]).unwrap();
        match cli.command {
            Some(Commands::Transcribe { file }) => assert_eq!(file, PathBuf::from("memo.wav")),
            _ => panic!("expected transcribe"),
        }
        assert!(Cli::try_parse_from(["orb", "transcribe"]).is_err());
    }
}
