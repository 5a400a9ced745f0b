use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/typesprint`, or the platform data dir without `$HOME`.
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("typesprint"),
            )
        } else {
            ProjectDirs::from("", "", "typesprint")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn history_db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("history.db"))
    }

    pub fn leaderboard_db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("leaderboard.db"))
    }

    pub fn log_dir() -> Option<PathBuf> {
        Self::state_dir()
    }
}
