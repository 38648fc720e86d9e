//! Matchup (one pairing shown to the judge) and Outcome (the judge's decision).

use crate::models::candidate::Candidate;
use crate::models::error::TournamentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which side(s) the judge picked.
///
/// `BothWin` and `NeitherWins` are a tie and a skip, not a loss for either side.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[serde(alias = "left")]
    LeftWins,
    #[serde(alias = "right")]
    RightWins,
    #[serde(alias = "both")]
    BothWin,
    #[serde(alias = "neither")]
    NeitherWins,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [
        Outcome::LeftWins,
        Outcome::RightWins,
        Outcome::BothWin,
        Outcome::NeitherWins,
    ];

    /// Same decision seen from the other side of the table.
    pub fn mirror(self) -> Self {
        match self {
            Outcome::LeftWins => Outcome::RightWins,
            Outcome::RightWins => Outcome::LeftWins,
            other => other,
        }
    }

    /// Actual scores `(S_left, S_right)` for the Elo update.
    pub fn scores(self) -> (f64, f64) {
        match self {
            Outcome::LeftWins => (1.0, 0.0),
            Outcome::RightWins => (0.0, 1.0),
            Outcome::BothWin => (1.0, 1.0),
            Outcome::NeitherWins => (0.0, 0.0),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::LeftWins => "left",
            Outcome::RightWins => "right",
            Outcome::BothWin => "both",
            Outcome::NeitherWins => "neither",
        };
        f.write_str(s)
    }
}

impl FromStr for Outcome {
    type Err = TournamentError;

    /// Accepts the short wire names (`left`, `right`, `both`, `neither`) and the
    /// variant names in either case style.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "").as_str() {
            "left" | "leftwins" => Ok(Outcome::LeftWins),
            "right" | "rightwins" => Ok(Outcome::RightWins),
            "both" | "bothwin" => Ok(Outcome::BothWin),
            "neither" | "neitherwins" => Ok(Outcome::NeitherWins),
            _ => Err(TournamentError::InvalidOutcome(s.to_string())),
        }
    }
}

/// A single pairing. `left != right` always holds for matchups the scheduler serves.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub left: Candidate,
    pub right: Candidate,
    /// Bracket round this matchup belongs to (0-based).
    pub round: u32,
    /// Position in the overall sequence of served matchups (0-based).
    pub index: u32,
}

impl Matchup {
    pub fn involves(&self, candidate_id: &str) -> bool {
        self.left.id == candidate_id || self.right.id == candidate_id
    }
}
