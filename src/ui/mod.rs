//! Shared terminal presentation helpers.

pub mod error;
pub mod reveal;
pub mod scrub;

pub use error::render_error;
pub use reveal::WordReveal;
pub use scrub::{format_time, scrub_progress};
