//! Journal history: SQLite persistence and the interactive viewer.

pub mod storage;
pub mod ui;

pub use storage::{HistoryManager, JournalEntry, NewEntry};
pub use ui::HistoryViewer;
