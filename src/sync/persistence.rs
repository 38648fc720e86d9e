//! The persistence collaborator: whatever actually stores ratings (a database,
//! an HTTP backend). The engine never calls it directly; the sync queue does.

use crate::models::{RatingSnapshot, SessionId};
use crate::sync::outbox::{OperationType, RatingsPayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceErrorKind {
    /// Backend unreachable or flaky. Retried.
    Network,
    /// Backend rejected the data. Not retried.
    Validation,
    /// The attempt did not finish in time. Retried.
    Timeout,
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{kind:?} failure: {message}")]
pub struct PersistenceError {
    pub kind: PersistenceErrorKind,
    pub message: String,
}

impl PersistenceError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: PersistenceErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: PersistenceErrorKind::Validation,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: PersistenceErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind != PersistenceErrorKind::Validation
    }
}

#[async_trait]
pub trait RatingsPersistence: Send + Sync {
    /// Store `payload.ratings` for `payload.session_id`.
    async fn save_ratings(
        &self,
        operation: OperationType,
        payload: &RatingsPayload,
    ) -> Result<(), PersistenceError>;
}

/// Writes one JSON document per session under `dir`, merging each write into
/// what is already there. Used by the web binary.
#[derive(Clone, Debug)]
pub struct JsonFilePersistence {
    dir: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionDocument {
    session_id: Option<SessionId>,
    judge: Option<String>,
    finished: bool,
    ratings: RatingSnapshot,
}

impl JsonFilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, session_id: SessionId) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }
}

#[async_trait]
impl RatingsPersistence for JsonFilePersistence {
    async fn save_ratings(
        &self,
        operation: OperationType,
        payload: &RatingsPayload,
    ) -> Result<(), PersistenceError> {
        if payload.ratings.is_empty() {
            return Err(PersistenceError::validation("no ratings in payload"));
        }
        if let Some((id, _)) = payload
            .ratings
            .iter()
            .find(|(_, rating)| !rating.value.is_finite())
        {
            return Err(PersistenceError::validation(format!(
                "rating for {id} is not a finite number"
            )));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PersistenceError::network(format!("create {}: {}", self.dir.display(), e)))?;

        let path = self.path_for(payload.session_id);
        // An unreadable document is never replaced; that would drop what it holds.
        let mut document: SessionDocument = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                PersistenceError::validation(format!("corrupt document {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionDocument::default(),
            Err(e) => {
                return Err(PersistenceError::network(format!(
                    "read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        document.session_id = Some(payload.session_id);
        document.judge = payload.judge.clone().or(document.judge);
        document.finished |= operation == OperationType::SessionFinished;
        document
            .ratings
            .extend(payload.ratings.iter().map(|(id, r)| (id.clone(), *r)));

        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| PersistenceError::validation(format!("serialize: {}", e)))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| PersistenceError::network(format!("write {}: {}", path.display(), e)))
    }
}
