//! Outbox entries and the durable store that keeps them across restarts.

use crate::models::{RatingSnapshot, SessionId, TournamentError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Unique identifier for an outbox entry.
pub type OutboxEntryId = Uuid;

/// Kind of write an entry carries.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// The two ratings touched by one vote.
    VoteRecorded,
    /// Every rating of a session that completed or was aborted.
    SessionFinished,
}

/// Ratings to hand to the persistence collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingsPayload {
    pub session_id: SessionId,
    #[serde(default)]
    pub judge: Option<String>,
    pub ratings: RatingSnapshot,
}

impl RatingsPayload {
    /// Resources this write touches. Two entries sharing any key are delivered
    /// in enqueue order.
    pub fn resource_keys(&self) -> Vec<String> {
        std::iter::once(format!("session:{}", self.session_id))
            .chain(self.ratings.keys().map(|id| format!("candidate:{id}")))
            .collect()
    }
}

/// Message the engine emits for every write it wants persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistRequest {
    pub operation: OperationType,
    pub payload: RatingsPayload,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    #[default]
    Pending,
    /// Gave up (attempt ceiling or non-retryable failure); left for the caller.
    Failed,
}

/// A queued write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: OutboxEntryId,
    /// Monotonic enqueue position; delivery order follows it.
    pub sequence: u64,
    pub operation: OperationType,
    pub payload: RatingsPayload,
    pub enqueued_at: DateTime<Utc>,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    /// Not retried before this instant.
    pub next_attempt_at: DateTime<Utc>,
    #[serde(default)]
    pub state: EntryState,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl OutboxEntry {
    pub fn new(
        sequence: u64,
        operation: OperationType,
        payload: RatingsPayload,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            operation,
            payload,
            enqueued_at: now,
            attempts: 0,
            next_attempt_at: now,
            state: EntryState::Pending,
            last_error: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at <= now
    }
}

/// Durable backing for the outbox. `save` receives the complete entry list every time.
pub trait OutboxStore: Send + Sync {
    fn load(&self) -> Result<Vec<OutboxEntry>, TournamentError>;
    fn save(&self, entries: &[OutboxEntry]) -> Result<(), TournamentError>;
}

/// Keeps the last saved list in memory. Survives nothing; used for tests and
/// when no outbox path is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<OutboxEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<OutboxEntry>) -> Self {
        Self {
            saved: Mutex::new(entries),
        }
    }

    /// What the last `save` wrote.
    pub fn saved(&self) -> Vec<OutboxEntry> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OutboxStore for MemoryStore {
    fn load(&self) -> Result<Vec<OutboxEntry>, TournamentError> {
        Ok(self.saved())
    }

    fn save(&self, entries: &[OutboxEntry]) -> Result<(), TournamentError> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = entries.to_vec();
        Ok(())
    }
}

/// JSON file on disk. Writes go to a sibling temp file first and are renamed
/// into place, so a crash mid-write leaves the previous list intact.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "outbox".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl OutboxStore for JsonFileStore {
    fn load(&self) -> Result<Vec<OutboxEntry>, TournamentError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            TournamentError::Outbox(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|e| {
            TournamentError::Outbox(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, entries: &[OutboxEntry]) -> Result<(), TournamentError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TournamentError::Outbox(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| TournamentError::Outbox(format!("failed to serialize outbox: {}", e)))?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json).map_err(|e| {
            TournamentError::Outbox(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            TournamentError::Outbox(format!(
                "failed to move {} into place: {}",
                tmp.display(),
                e
            ))
        })
    }
}
