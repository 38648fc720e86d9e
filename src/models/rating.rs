//! Rating: per-candidate strength estimate plus win/loss counters.

use crate::models::candidate::CandidateId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only export of every candidate's rating, ordered by id.
pub type RatingSnapshot = BTreeMap<CandidateId, Rating>;

/// Elo-like score with counters. `value` is kept inside the configured clamp by
/// everything that writes it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub value: f64,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
}

impl Rating {
    /// Fresh rating with no history.
    pub fn seeded(value: f64) -> Self {
        Self {
            value,
            wins: 0,
            losses: 0,
        }
    }

    pub fn with_record(value: f64, wins: u32, losses: u32) -> Self {
        Self {
            value,
            wins,
            losses,
        }
    }

    /// Record a win. Counters carried over from elsewhere may already be at the top.
    pub fn add_win(&mut self) {
        self.wins = self.wins.saturating_add(1);
    }

    /// Record a loss.
    pub fn add_loss(&mut self) {
        self.losses = self.losses.saturating_add(1);
    }

    /// Decided comparisons this candidate took part in.
    pub fn decided(&self) -> u32 {
        self.wins.saturating_add(self.losses)
    }
}
