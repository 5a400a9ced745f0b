use tracing::{info, warn};

use crate::config::TestConfig;
use crate::history::{HistoryEntry, HistoryStore};
use crate::scoreboard::{LeaderboardEntry, ScoreSubmission, Scoreboard};
use crate::session::{Latch, TestResult};

/// What happened to the scoreboard submission for a result.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Submitted(LeaderboardEntry),
    /// No scoreboard configured, or no player name.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkReport {
    pub recorded: bool,
    pub submission: SubmissionOutcome,
}

/// Receives finished results, appends them to history and submits them to
/// the scoreboard. Delivers at most once per session.
pub struct ResultSink<H: HistoryStore> {
    history: H,
    scoreboard: Option<Box<dyn Scoreboard>>,
    name: Option<String>,
    delivered: Latch,
}

impl<H: HistoryStore> ResultSink<H> {
    pub fn new(history: H) -> Self {
        Self {
            history,
            scoreboard: None,
            name: None,
            delivered: Latch::new(),
        }
    }

    pub fn with_scoreboard(mut self, scoreboard: Box<dyn Scoreboard>) -> Self {
        self.scoreboard = Some(scoreboard);
        self
    }

    pub fn with_name(mut self, name: Option<&str>) -> Self {
        self.name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);
        self
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn scoreboard(&self) -> Option<&dyn Scoreboard> {
        self.scoreboard.as_deref()
    }

    /// Allows one more delivery. Call when a new session starts.
    pub fn begin_session(&mut self) {
        self.delivered.rearm();
    }

    /// Records `result` and submits it. Practice results and repeat
    /// deliveries within a session are ignored and yield `None`.
    pub fn deliver(&mut self, result: &TestResult, config: &TestConfig) -> Option<SinkReport> {
        if config.is_practice() {
            return None;
        }
        if !self.delivered.trip() {
            warn!("duplicate result delivery ignored");
            return None;
        }

        let entry = HistoryEntry {
            result: result.clone(),
            config: *config,
        };
        let recorded = match self.history.record(&entry) {
            Ok(inserted) => inserted,
            Err(e) => {
                warn!(error = %e, "failed to record history");
                false
            }
        };

        let submission = self.submit(result, config);
        info!(recorded, submission = ?submission, "result delivered");
        Some(SinkReport {
            recorded,
            submission,
        })
    }

    fn submit(&self, result: &TestResult, config: &TestConfig) -> SubmissionOutcome {
        let (Some(board), Some(name)) = (self.scoreboard.as_deref(), self.name.as_deref()) else {
            return SubmissionOutcome::Skipped;
        };
        let submission = ScoreSubmission {
            name: name.to_string(),
            wpm: result.wpm,
            accuracy: result.accuracy,
            difficulty: config.difficulty,
            mode: config.mode,
        };
        match board.submit(&submission) {
            Ok(entry) => SubmissionOutcome::Submitted(entry),
            Err(e) => {
                warn!(error = %e, "score submission failed");
                SubmissionOutcome::Failed(e.to_string())
            }
        }
    }
}
