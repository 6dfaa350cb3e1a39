use crate::agenda::AgendaItem;
use crate::app_dirs::AppDirs;
use crate::history::Meeting;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a durable read or write failed. Callers log and continue; nothing
/// in the engine propagates a storage failure as a crash.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("payload encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable shape of the in-progress meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub agenda_items: Vec<AgendaItem>,
    pub is_running: bool,
    pub saved_at: i64,
}

pub trait SessionStore: std::fmt::Debug {
    /// `Ok(None)` means no session has ever been saved (or it was cleared).
    fn load_session(&self) -> StoreResult<Option<SessionPayload>>;
    fn save_session(&self, payload: &SessionPayload) -> StoreResult<()>;
    fn clear_session(&self) -> StoreResult<()>;
}

pub trait HistoryStore: std::fmt::Debug {
    fn load_history(&self) -> StoreResult<Vec<Meeting>>;
    fn save_history(&self, meetings: &[Meeting]) -> StoreResult<()>;
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(path, data)?;
    Ok(())
}

/// Live-session record as a single JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new() -> Option<Self> {
        AppDirs::session_path().map(|path| Self { path })
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load_session(&self) -> StoreResult<Option<SessionPayload>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        let payload = serde_json::from_slice(&bytes)?;
        Ok(Some(payload))
    }

    fn save_session(&self, payload: &SessionPayload) -> StoreResult<()> {
        write_json(&self.path, payload)
    }

    fn clear_session(&self) -> StoreResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Archive of completed meetings as a single JSON file.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new() -> Option<Self> {
        AppDirs::history_path().map(|path| Self { path })
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl HistoryStore for FileHistoryStore {
    fn load_history(&self) -> StoreResult<Vec<Meeting>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&self.path)?;
        let meetings = serde_json::from_slice(&bytes)?;
        Ok(meetings)
    }

    fn save_history(&self, meetings: &[Meeting]) -> StoreResult<()> {
        write_json(&self.path, meetings)
    }
}
