use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("gavel"),
            )
        } else {
            ProjectDirs::from("", "", "gavel").map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    pub fn session_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("session.json"))
    }

    pub fn history_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("history.json"))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "gavel").map(|pd| pd.config_dir().join("config.json"))
    }
}
