//! Audio recording for journal entries.
//!
//! Provides the recording lifecycle controller and the event loop that drives
//! it, level normalization, the cpal capture sink, and the record screen.

pub mod audio;
pub mod controller;
pub mod ffmpeg;
pub mod level;
pub mod recorder;
pub mod sink;
pub mod ui;

pub use audio::{CpalSink, DevicePermission};
pub use controller::{RecorderSnapshot, RecordingController};
pub use recorder::{Recorder, RecorderHandle};
pub use sink::AssetHandle;
pub use ui::{OrbTui, ScreenInput, ScreenView};
