//! Application command handlers for orb.
//!
//! Each submodule handles one command.
//!
//! # Commands
//! - `auth`: Email code sign in and sign out
//! - `record`: Record an entry with the live orb and show the response
//! - `transcribe`: Turn an existing audio file into an entry
//! - `insight`: Reflection across recent entries
//! - `history`: Journal history viewer
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod auth;
pub mod config;
pub mod history;
pub mod insight;
pub mod list_devices;
pub mod logs;
pub mod record;
pub mod transcribe;

pub use auth::{handle_login, handle_logout};
pub use config::handle_config;
pub use history::handle_history;
pub use insight::handle_insight;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use record::handle_record;
pub use transcribe::handle_transcribe;
