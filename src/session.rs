use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// waiting on the passage; input locked
    Initializing,
    Ready,
    Running,
    Finished,
}

/// How a passage position renders against what has been typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharState {
    Correct,
    Incorrect,
    Pending,
}

/// Final score of one session. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub wpm: u32,
    pub accuracy: u32,
    pub mistakes: usize,
    pub total_chars: usize,
    pub time_taken: u32,
    pub date: DateTime<Utc>,
    pub mode: Mode,
}

/// One-shot gate: `trip` succeeds exactly once until `rearm`.
#[derive(Debug, Default, Clone)]
pub struct Latch {
    tripped: bool,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the latch, returning true only for the call that closed it.
    pub fn trip(&mut self) -> bool {
        !std::mem::replace(&mut self.tripped, true)
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn rearm(&mut self) {
        self.tripped = false;
    }
}

/// Mutable typing state owned by one engine.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub passage: Vec<char>,
    pub typed: Vec<char>,
    pub mistakes: usize,
    pub locked: bool,
}

impl SessionState {
    pub fn correct_chars(&self) -> usize {
        self.typed
            .iter()
            .zip(self.passage.iter())
            .filter(|(t, p)| t == p)
            .count()
    }

    pub fn is_complete(&self) -> bool {
        !self.passage.is_empty() && self.typed.len() == self.passage.len()
    }
}
