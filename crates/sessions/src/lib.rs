//! Session persistence — one JSON file per conversation.
//!
//! Storage location: `<data_dir>/sessions/<session_id>.json`
//!
//! Sessions are what give the CLI conversational continuity: `prowl chat`
//! restores the message log, runs one turn, and saves it back. Simple,
//! portable, human-inspectable.

use chrono::{DateTime, Utc};
use prowl_core::error::StorageError;
use prowl_core::message::Message;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A persisted conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: String,

    /// Ordered message log
    pub messages: Vec<Message>,

    /// When this session was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new empty session with a fresh id.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a session with a caller-chosen id.
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.id = id.into();
        session
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// A directory of session files.
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at the given directory.
    ///
    /// The directory is created on first save, not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Persist a session, stamping `updated_at`.
    pub fn save(&self, session: &mut Session) -> Result<(), StorageError> {
        session.updated_at = Utc::now();

        std::fs::create_dir_all(&self.root).map_err(|e| StorageError::Io {
            path: self.root.display().to_string(),
            reason: e.to_string(),
        })?;

        let path = self.path_for(&session.id);
        let content =
            serde_json::to_string_pretty(session).map_err(|e| StorageError::Encode(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(session_id = %session.id, messages = session.messages.len(), "Session saved");
        Ok(())
    }

    /// Load a session by id. Returns `None` if no file exists.
    pub fn load(&self, id: &str) -> Result<Option<Session>, StorageError> {
        let path = self.path_for(id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Io {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let session = serde_json::from_str(&content).map_err(|e| StorageError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(session))
    }

    /// List all sessions, newest first. Corrupt files are skipped with a
    /// warning rather than aborting the listing.
    pub fn list(&self) -> Result<Vec<Session>, StorageError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::Io {
                    path: self.root.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let mut sessions: Vec<Session> = entries
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    return None;
                }
                match Self::read_session(&path) {
                    Ok(session) => Some(session),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping corrupt session file");
                        None
                    }
                }
            })
            .collect();

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    /// Delete a session file. Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn read_session(path: &Path) -> Result<Session, StorageError> {
        let content = std::fs::read_to_string(path).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| StorageError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
