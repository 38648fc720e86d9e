//! Candidate: one of the items being ranked.

use serde::{Deserialize, Serialize};

/// Opaque identifier for a candidate, supplied by the candidate source.
pub type CandidateId = String;

/// A candidate in the tournament. Immutable once the session starts.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    /// Display label (the name shown on the card).
    pub label: String,
}

impl Candidate {
    pub fn new(id: impl Into<CandidateId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Candidate whose id is its label. Handy when the source has no separate ids.
    pub fn labelled(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id: label.clone(),
            label,
        }
    }
}
