//! Errors surfaced by the engine and the sync queue.

use crate::models::candidate::CandidateId;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during tournament and sync operations.
///
/// Validation errors are returned synchronously and are never retried.
/// `PersistenceFailed` is only produced once the sync queue gives up on an entry.
#[derive(Clone, Debug, Eq, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TournamentError {
    /// Bad candidate set or configuration (empty, duplicate ids, bad bounds).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Fewer than two candidates; no matchup can be produced.
    #[error("need at least 2 candidates (got {found})")]
    InsufficientCandidates { found: usize },
    /// Outcome string is not one of left/right/both/neither.
    #[error("invalid outcome: {0:?}")]
    InvalidOutcome(String),
    /// Another vote on this session has not resolved yet.
    #[error("a vote is already in progress for this session")]
    VoteInProgress,
    /// Vote arrived inside the cooldown window after the previous one.
    #[error("vote submitted too soon; retry in {retry_after_ms} ms")]
    VoteTooSoon { retry_after_ms: u64 },
    /// The session has already completed; there is no current matchup.
    #[error("tournament session is already complete")]
    SessionComplete,
    /// Candidate id was never registered in the rating store.
    #[error("candidate not found: {0}")]
    NotFound(CandidateId),
    /// The sync queue exhausted its retries (or hit a non-retryable failure).
    #[error("persistence failed for outbox entry {entry_id}: {reason}")]
    PersistenceFailed { entry_id: Uuid, reason: String },
    /// Durable outbox storage could not be read or written.
    #[error("outbox storage error: {0}")]
    Outbox(String),
}
