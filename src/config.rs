use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Duration applied when a difficulty is picked without an explicit one.
    pub fn recommended_duration(self) -> u32 {
        match self {
            Difficulty::Easy => 60,
            Difficulty::Medium => 90,
            Difficulty::Hard => 120,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// timed run, recorded to history and the scoreboard
    #[default]
    Test,
    /// untimed, never recorded
    Practice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroDuration,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroDuration => write!(f, "test duration must be at least one second"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Settings for a single session. Fixed once the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    duration: u32,
    pub difficulty: Difficulty,
    pub mode: Mode,
}

impl TestConfig {
    pub fn new(duration: u32, difficulty: Difficulty, mode: Mode) -> Result<Self, ConfigError> {
        if duration == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        Ok(Self {
            duration,
            difficulty,
            mode,
        })
    }

    /// Uses the difficulty's recommended duration.
    pub fn recommended(difficulty: Difficulty, mode: Mode) -> Self {
        Self {
            duration: difficulty.recommended_duration(),
            difficulty,
            mode,
        }
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn is_practice(&self) -> bool {
        self.mode == Mode::Practice
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            duration: 60,
            difficulty: Difficulty::Medium,
            mode: Mode::Test,
        }
    }
}

/// Persisted user preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub duration: Option<u32>,
    pub difficulty: Difficulty,
    pub mode: Mode,
    pub name: Option<String>,
    pub scoreboard_url: Option<String>,
    pub passage_url: Option<String>,
    pub passage_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration: Some(60),
            difficulty: Difficulty::Medium,
            mode: Mode::Test,
            name: None,
            scoreboard_url: None,
            passage_url: None,
            passage_timeout_secs: 5,
        }
    }
}

impl Config {
    /// Session settings derived from these preferences. A missing duration
    /// falls back to the difficulty's recommendation.
    pub fn test_config(&self) -> Result<TestConfig, ConfigError> {
        match self.duration {
            Some(secs) => TestConfig::new(secs, self.difficulty, self.mode),
            None => Ok(TestConfig::recommended(self.difficulty, self.mode)),
        }
    }

    /// Player name with surrounding whitespace removed, if any is left.
    pub fn player_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "typesprint") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("typesprint_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "ignoring unreadable config"
                    )
                }
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
