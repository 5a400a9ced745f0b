use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::config::{Difficulty, Mode, TestConfig};
use crate::session::TestResult;

/// A finished test together with the settings it ran under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub result: TestResult,
    pub config: TestConfig,
}

#[derive(Debug)]
pub enum HistoryError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    Csv(csv::Error),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::Sqlite(e) => write!(f, "history database error: {e}"),
            HistoryError::Io(e) => write!(f, "history io error: {e}"),
            HistoryError::Csv(e) => write!(f, "history export error: {e}"),
        }
    }
}

impl std::error::Error for HistoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HistoryError::Sqlite(e) => Some(e),
            HistoryError::Io(e) => Some(e),
            HistoryError::Csv(e) => Some(e),
        }
    }
}

impl From<rusqlite::Error> for HistoryError {
    fn from(e: rusqlite::Error) -> Self {
        HistoryError::Sqlite(e)
    }
}

impl From<std::io::Error> for HistoryError {
    fn from(e: std::io::Error) -> Self {
        HistoryError::Io(e)
    }
}

impl From<csv::Error> for HistoryError {
    fn from(e: csv::Error) -> Self {
        HistoryError::Csv(e)
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// Ordered local record of finished tests.
pub trait HistoryStore {
    /// Adds an entry. Returns false when an entry with the same date exists.
    fn record(&mut self, entry: &HistoryEntry) -> Result<bool>;
    /// Most recent first.
    fn entries(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>>;
}

/// SQLite-backed history, one row per test, unique by result date.
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL UNIQUE,
        wpm INTEGER NOT NULL,
        accuracy INTEGER NOT NULL,
        mistakes INTEGER NOT NULL,
        total_chars INTEGER NOT NULL,
        time_taken INTEGER NOT NULL,
        mode TEXT NOT NULL,
        duration INTEGER NOT NULL,
        difficulty TEXT NOT NULL,
        config_mode TEXT NOT NULL
    )
"#;

impl HistoryDb {
    /// Opens the default database under the app state directory.
    pub fn new() -> Result<Self> {
        let path = AppDirs::history_db_path()
            .unwrap_or_else(|| PathBuf::from("typesprint_history.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])?;
        Ok(Self { conn })
    }

    /// Writes every entry, oldest first, as CSV.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let mut entries = self.entries(None)?;
        entries.reverse();

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([
            "date",
            "wpm",
            "accuracy",
            "mistakes",
            "total_chars",
            "time_taken",
            "mode",
            "duration",
            "difficulty",
        ])?;
        for entry in &entries {
            writer.write_record([
                entry.result.date.to_rfc3339_opts(SecondsFormat::Millis, true),
                entry.result.wpm.to_string(),
                entry.result.accuracy.to_string(),
                entry.result.mistakes.to_string(),
                entry.result.total_chars.to_string(),
                entry.result.time_taken.to_string(),
                entry.result.mode.to_string(),
                entry.config.duration().to_string(),
                entry.config.difficulty.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(entries.len())
    }
}

fn parse_mode(s: &str) -> Mode {
    if s == "practice" {
        Mode::Practice
    } else {
        Mode::Test
    }
}

fn text_column_error(idx: usize, what: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(idx, what.to_string(), rusqlite::types::Type::Text)
}

impl HistoryStore for HistoryDb {
    fn record(&mut self, entry: &HistoryEntry) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO history
            (date, wpm, accuracy, mistakes, total_chars, time_taken, mode, duration, difficulty, config_mode)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                entry.result.date.to_rfc3339_opts(SecondsFormat::Nanos, true),
                entry.result.wpm,
                entry.result.accuracy,
                entry.result.mistakes as i64,
                entry.result.total_chars as i64,
                entry.result.time_taken,
                entry.result.mode.to_string(),
                entry.config.duration(),
                entry.config.difficulty.to_string(),
                entry.config.mode.to_string(),
            ],
        )?;
        Ok(inserted == 1)
    }

    fn entries(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, wpm, accuracy, mistakes, total_chars, time_taken, mode,
                   duration, difficulty, config_mode
            FROM history
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit], |row| {
            let date_str: String = row.get(0)?;
            let date = DateTime::parse_from_rfc3339(&date_str)
                .map_err(|_| text_column_error(0, "date"))?
                .with_timezone(&Utc);
            let difficulty_str: String = row.get(8)?;
            let difficulty = Difficulty::parse(&difficulty_str)
                .ok_or_else(|| text_column_error(8, "difficulty"))?;
            let duration: u32 = row.get(7)?;
            let config_mode = parse_mode(&row.get::<_, String>(9)?);
            let config = TestConfig::new(duration, difficulty, config_mode)
                .map_err(|_| text_column_error(7, "duration"))?;

            Ok(HistoryEntry {
                result: TestResult {
                    wpm: row.get(1)?,
                    accuracy: row.get(2)?,
                    mistakes: row.get::<_, i64>(3)? as usize,
                    total_chars: row.get::<_, i64>(4)? as usize,
                    time_taken: row.get(5)?,
                    date,
                    mode: parse_mode(&row.get::<_, String>(6)?),
                },
                config,
            })
        })?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }
}
