//! Session identifiers and the values the engine hands back to callers.

use crate::models::candidate::Candidate;
use crate::models::matchup::Matchup;
use crate::models::rating::RatingSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a tournament session.
pub type SessionId = Uuid;

/// Scheduler lifecycle.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    /// Candidates registered, shuffle not yet done.
    #[default]
    Seeding,
    /// Serving matchups.
    InProgress,
    /// Required comparisons reached (or aborted); no more matchups.
    Complete,
}

/// What a successful vote leads to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VoteResult {
    /// The tournament continues with this matchup.
    Next { matchup: Matchup },
    /// The tournament is over.
    Completed { final_ratings: RatingSnapshot },
}

impl VoteResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, VoteResult::Completed { .. })
    }
}

/// One row of the final ranking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub candidate: Candidate,
    pub rating: f64,
    pub wins: u32,
    pub losses: u32,
}

/// Serializable view of a session (for API responses).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub id: SessionId,
    pub judge: Option<String>,
    pub phase: SchedulerPhase,
    pub complete: bool,
    pub round: u32,
    pub votes_applied: u32,
    pub current_match: Option<Matchup>,
    pub standings: Vec<Standing>,
}
