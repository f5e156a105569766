//! Journal history storage and retrieval using SQLite.
//!
//! Every processed entry is stored with its transcription, title, sentiment and
//! follow-up so the history command can list past reflections.

use anyhow::Result;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};

/// A single journal entry in the history.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub id: i64,
    pub transcription: String,
    pub title: String,
    pub sentiment_label: String,
    pub sentiment_score: f64,
    /// Follow-up question shown to the user, or the title when none was generated
    pub response: String,
    pub duration_secs: f64,
    pub created_at: DateTime<Local>,
}

/// Fields of an entry that is about to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub transcription: String,
    pub title: String,
    pub sentiment_label: String,
    pub sentiment_score: f64,
    pub response: String,
    pub duration_secs: f64,
}

const SELECT_COLUMNS: &str = "SELECT id, transcription, title, sentiment_label, sentiment_score, \
     response, duration_secs, created_at FROM entries";

/// Manages the journal history database.
pub struct HistoryManager {
    database_path: PathBuf,
    /// Connection to the database (lazy-loaded)
    connection: Option<Connection>,
}

impl HistoryManager {
    /// Creates a history manager storing its database in `data_dir`.
    ///
    /// # Errors
    /// - If the data directory cannot be created
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let database_path = data_dir.join("journal.db");

        Ok(Self {
            database_path,
            connection: None,
        })
    }

    /// Opens the database on first use and creates the table if necessary.
    fn get_connection(&mut self) -> Result<&Connection> {
        if self.connection.is_none() {
            let connection = Connection::open(&self.database_path)?;

            connection.execute(
                "CREATE TABLE IF NOT EXISTS entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    transcription TEXT NOT NULL,
                    title TEXT NOT NULL,
                    sentiment_label TEXT NOT NULL,
                    sentiment_score REAL NOT NULL,
                    response TEXT NOT NULL,
                    duration_secs REAL NOT NULL,
                    created_at TEXT NOT NULL
                )",
                [],
            )?;

            tracing::debug!("Opened journal database at {}", self.database_path.display());
            self.connection = Some(connection);
        }

        self.connection
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Journal database is not open"))
    }

    /// Saves a processed entry and returns its id.
    ///
    /// # Errors
    /// - If database connection fails
    /// - If insertion fails
    pub fn save_entry(&mut self, entry: &NewEntry) -> Result<i64> {
        let connection = self.get_connection()?;
        let timestamp = Local::now().to_rfc3339();

        connection.execute(
            "INSERT INTO entries (transcription, title, sentiment_label, sentiment_score, \
             response, duration_secs, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.transcription,
                entry.title,
                entry.sentiment_label,
                entry.sentiment_score,
                entry.response,
                entry.duration_secs,
                timestamp
            ],
        )?;

        let id = connection.last_insert_rowid();
        tracing::debug!("Journal entry {} saved to history", id);
        Ok(id)
    }

    /// Retrieves all entries, most recent first.
    ///
    /// Ordered by insertion rather than by the stored local timestamp, whose
    /// UTC offset changes across daylight saving transitions.
    ///
    /// # Errors
    /// - If database connection or the query fails
    /// - If a stored timestamp cannot be parsed
    pub fn get_all_entries(&mut self) -> Result<Vec<JournalEntry>> {
        let connection = self.get_connection()?;

        let mut statement =
            connection.prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC"))?;
        let entries = statement
            .query_map([], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<JournalEntry> {
    let timestamp_str = row.get::<_, String>(7)?;
    let created_at = DateTime::parse_from_rfc3339(&timestamp_str)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|_| {
            rusqlite::Error::InvalidParameterName("Invalid timestamp format".to_string())
        })?;

    Ok(JournalEntry {
        id: row.get(0)?,
        transcription: row.get(1)?,
        title: row.get(2)?,
        sentiment_label: row.get(3)?,
        sentiment_score: row.get(4)?,
        response: row.get(5)?,
        duration_secs: row.get(6)?,
        created_at,
    })
}
