//! Journal entry processing: stages, the orb's view of them, and the upload
//! pipeline that turns a recording into an entry.

pub mod pipeline;
pub mod stage;

pub use pipeline::{process_audio, process_recording, EntryOutcome};
pub use stage::{OrbStage, ProcessingStage, StageAnimation};
