//! Configuration management for orb.
//!
//! This module handles loading and saving application configuration from TOML files,
//! as well as storage of the signed-in session. Configuration is stored in the
//! user's config directory, while the session is stored with restricted permissions
//! in the user's local data directory.

pub mod file;
pub mod session;

pub use file::{config_path, data_dir, OrbConfig};
pub use session::{AuthSession, SessionStore, SessionUser};
