use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::app_dirs::AppDirs;
use crate::config::{Difficulty, Mode};

/// Summary sent to the scoreboard for one finished test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub name: String,
    pub wpm: u32,
    pub accuracy: u32,
    pub difficulty: Difficulty,
    pub mode: Mode,
}

/// A stored score as returned by the scoreboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub wpm: u32,
    pub accuracy: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub mode: Mode,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPage {
    pub scores: Vec<LeaderboardEntry>,
    pub total_pages: u32,
    pub current_page: u32,
    pub total_scores: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DifficultyFilter {
    #[default]
    All,
    Only(Difficulty),
}

impl DifficultyFilter {
    pub fn difficulty(self) -> Option<Difficulty> {
        match self {
            DifficultyFilter::All => None,
            DifficultyFilter::Only(d) => Some(d),
        }
    }
}

impl fmt::Display for DifficultyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyFilter::All => write!(f, "all"),
            DifficultyFilter::Only(d) => write!(f, "{d}"),
        }
    }
}

impl FromStr for DifficultyFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(DifficultyFilter::All);
        }
        Difficulty::parse(s)
            .map(DifficultyFilter::Only)
            .ok_or_else(|| format!("unknown difficulty '{s}' (expected all, easy, medium or hard)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardQuery {
    pub page: u32,
    pub limit: u32,
    pub difficulty: DifficultyFilter,
}

impl Default for LeaderboardQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            difficulty: DifficultyFilter::All,
        }
    }
}

impl LeaderboardQuery {
    pub fn new(page: u32, limit: u32, difficulty: DifficultyFilter) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
            difficulty,
        }
    }

    fn offset(&self) -> u64 {
        (self.page.max(1) as u64 - 1) * self.limit.max(1) as u64
    }
}

/// `ceil(total / limit)`; an empty board has zero pages.
pub fn total_pages(total: u64, limit: u32) -> u32 {
    total.div_ceil(limit.max(1) as u64) as u32
}

#[derive(Debug)]
pub enum ScoreboardError {
    /// name, wpm or accuracy absent
    MissingFields,
    Status { code: u16, message: String },
    Transport(reqwest::Error),
    Decode(String),
    Storage(rusqlite::Error),
    Io(std::io::Error),
}

impl fmt::Display for ScoreboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreboardError::MissingFields => write!(f, "missing required fields"),
            ScoreboardError::Status { code, message } => {
                write!(f, "scoreboard returned {code}: {message}")
            }
            ScoreboardError::Transport(e) => write!(f, "scoreboard unreachable: {e}"),
            ScoreboardError::Decode(msg) => write!(f, "unexpected scoreboard response: {msg}"),
            ScoreboardError::Storage(e) => write!(f, "scoreboard storage failed: {e}"),
            ScoreboardError::Io(e) => write!(f, "scoreboard storage failed: {e}"),
        }
    }
}

impl std::error::Error for ScoreboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScoreboardError::Transport(e) => Some(e),
            ScoreboardError::Storage(e) => Some(e),
            ScoreboardError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ScoreboardError {
    fn from(e: reqwest::Error) -> Self {
        ScoreboardError::Transport(e)
    }
}

impl From<rusqlite::Error> for ScoreboardError {
    fn from(e: rusqlite::Error) -> Self {
        ScoreboardError::Storage(e)
    }
}

impl From<std::io::Error> for ScoreboardError {
    fn from(e: std::io::Error) -> Self {
        ScoreboardError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, ScoreboardError>;

/// Ranked, paginated store of submitted scores.
///
/// Ranking is `wpm desc, accuracy desc, date desc`.
pub trait Scoreboard {
    fn submit(&self, submission: &ScoreSubmission) -> Result<LeaderboardEntry>;
    fn page(&self, query: &LeaderboardQuery) -> Result<LeaderboardPage>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the shared scoreboard service (`/api/scores`).
#[derive(Debug, Clone)]
pub struct HttpScoreboard {
    client: Client,
    endpoint: String,
}

impl HttpScoreboard {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("typesprint/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/scores", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn error_for(status: StatusCode, body: &str) -> ScoreboardError {
        if status == StatusCode::BAD_REQUEST {
            return ScoreboardError::MissingFields;
        }
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
        ScoreboardError::Status {
            code: status.as_u16(),
            message,
        }
    }
}

impl Scoreboard for HttpScoreboard {
    fn submit(&self, submission: &ScoreSubmission) -> Result<LeaderboardEntry> {
        let response = self.client.post(&self.endpoint).json(submission).send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(Self::error_for(status, &body));
        }

        let entry: LeaderboardEntry =
            serde_json::from_str(&body).map_err(|e| ScoreboardError::Decode(e.to_string()))?;
        info!(name = %entry.name, wpm = entry.wpm, "score submitted");
        Ok(entry)
    }

    fn page(&self, query: &LeaderboardQuery) -> Result<LeaderboardPage> {
        let mut params = vec![
            ("page", query.page.max(1).to_string()),
            ("limit", query.limit.max(1).to_string()),
        ];
        if let Some(d) = query.difficulty.difficulty() {
            params.push(("difficulty", d.to_string()));
        }

        let response = self.client.get(&self.endpoint).query(&params).send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(Self::error_for(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| ScoreboardError::Decode(e.to_string()))
    }
}

/// Offline scoreboard in SQLite with the same validation and ranking as
/// the shared service.
#[derive(Debug)]
pub struct LocalLeaderboard {
    conn: Connection,
}

impl LocalLeaderboard {
    pub fn new() -> Result<Self> {
        let path = AppDirs::leaderboard_db_path()
            .unwrap_or_else(|| PathBuf::from("typesprint_leaderboard.db"));
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
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS scores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                wpm INTEGER NOT NULL,
                accuracy INTEGER NOT NULL,
                difficulty TEXT NOT NULL,
                mode TEXT NOT NULL DEFAULT 'test',
                date TEXT NOT NULL
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_scores_rank ON scores(wpm DESC, accuracy DESC, date DESC)",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Stores an entry as-is, keeping its date.
    pub fn insert(&self, entry: &LeaderboardEntry) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO scores (name, wpm, accuracy, difficulty, mode, date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.name,
                entry.wpm,
                entry.accuracy,
                entry.difficulty.to_string(),
                entry.mode.to_string(),
                entry.date.to_rfc3339_opts(SecondsFormat::Nanos, true),
            ],
        )?;
        Ok(())
    }
}

impl Scoreboard for LocalLeaderboard {
    fn submit(&self, submission: &ScoreSubmission) -> Result<LeaderboardEntry> {
        let name = submission.name.trim();
        if name.is_empty() {
            return Err(ScoreboardError::MissingFields);
        }

        let entry = LeaderboardEntry {
            name: name.to_string(),
            wpm: submission.wpm,
            accuracy: submission.accuracy,
            difficulty: submission.difficulty,
            mode: submission.mode,
            date: Utc::now(),
        };
        self.insert(&entry)?;
        debug!(name = %entry.name, wpm = entry.wpm, "score stored locally");
        Ok(entry)
    }

    fn page(&self, query: &LeaderboardQuery) -> Result<LeaderboardPage> {
        let filter = query.difficulty.difficulty().map(|d| d.to_string());
        let limit = query.limit.max(1);

        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM scores WHERE (?1 IS NULL OR difficulty = ?1)",
            params![filter],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT name, wpm, accuracy, difficulty, mode, date
            FROM scores
            WHERE (?1 IS NULL OR difficulty = ?1)
            ORDER BY wpm DESC, accuracy DESC, date DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )?;

        let rows = stmt.query_map(params![filter, limit, query.offset() as i64], |row| {
            let difficulty_str: String = row.get(3)?;
            let mode_str: String = row.get(4)?;
            let date_str: String = row.get(5)?;
            let invalid = |idx: usize, what: &str| {
                rusqlite::Error::InvalidColumnType(
                    idx,
                    what.to_string(),
                    rusqlite::types::Type::Text,
                )
            };

            Ok(LeaderboardEntry {
                name: row.get(0)?,
                wpm: row.get(1)?,
                accuracy: row.get(2)?,
                difficulty: Difficulty::parse(&difficulty_str)
                    .ok_or_else(|| invalid(3, "difficulty"))?,
                mode: if mode_str == "practice" {
                    Mode::Practice
                } else {
                    Mode::Test
                },
                date: DateTime::parse_from_rfc3339(&date_str)
                    .map_err(|_| invalid(5, "date"))?
                    .with_timezone(&Utc),
            })
        })?;

        let mut scores = Vec::new();
        for entry in rows {
            scores.push(entry?);
        }

        let total = total as u64;
        Ok(LeaderboardPage {
            scores,
            total_pages: total_pages(total, limit),
            current_page: query.page.max(1),
            total_scores: total,
        })
    }
}
