//! Pair scheduling: which two candidates face off next and when the session ends.
//!
//! Candidates are shuffled once, then paired round-robin style (circle method)
//! in that seed order:
//! 1. Each round serves `ceil(n / 2)` matchups so every candidate appears at least once.
//! 2. With an odd count, the candidate drawing the bye faces the first candidate of the round.
//! 3. Pairings inside a round never change, so a fixed seed reproduces the whole session.

use crate::config::CompletionPolicy;
use crate::models::{Candidate, Matchup, SchedulerPhase, TournamentError};
use rand::seq::SliceRandom;
use rand::Rng;

/// Round a matchup belongs to, given its 0-based index in the session.
/// A round is `ceil(total_candidates / 2)` matchups long.
pub fn calculate_bracket_round(total_candidates: usize, match_index: u32) -> u32 {
    let per_round = total_candidates.div_ceil(2).max(1) as u32;
    match_index / per_round
}

/// Progress counters the completion policy is evaluated against.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScheduleProgress {
    pub comparisons: u32,
    /// Fewest matchups any single candidate has been part of.
    pub min_appearances: u32,
}

impl CompletionPolicy {
    pub fn is_satisfied(&self, progress: &ScheduleProgress) -> bool {
        match *self {
            CompletionPolicy::FixedComparisons { total } => progress.comparisons >= total,
            CompletionPolicy::MinAppearances { per_candidate } => {
                progress.min_appearances >= per_candidate
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct PairScheduler {
    /// Seed order (shuffled once in `seed`).
    order: Vec<Candidate>,
    phase: SchedulerPhase,
    policy: CompletionPolicy,
    /// Matchups consumed so far (voted on).
    completed: u32,
    /// Per seed position: matchups consumed that included this candidate.
    appearances: Vec<u32>,
}

impl PairScheduler {
    /// Fails fast with `InsufficientCandidates` when fewer than two candidates are given.
    pub fn new(candidates: Vec<Candidate>, policy: CompletionPolicy) -> Result<Self, TournamentError> {
        if candidates.len() < 2 {
            return Err(TournamentError::InsufficientCandidates {
                found: candidates.len(),
            });
        }
        let appearances = vec![0; candidates.len()];
        Ok(Self {
            order: candidates,
            phase: SchedulerPhase::Seeding,
            policy,
            completed: 0,
            appearances,
        })
    }

    /// Shuffle into seed order and start serving. Only the first call shuffles.
    pub fn seed<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.phase != SchedulerPhase::Seeding {
            return;
        }
        self.order.shuffle(rng);
        self.phase = SchedulerPhase::InProgress;
        log::debug!(
            "Seeded {} candidates; policy {:?}",
            self.order.len(),
            self.policy
        );
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == SchedulerPhase::Complete
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// Candidates in seed order.
    pub fn order(&self) -> &[Candidate] {
        &self.order
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// Round of the matchup currently being served (or of the last one, once complete).
    pub fn current_round(&self) -> u32 {
        let index = if self.is_complete() {
            self.completed.saturating_sub(1)
        } else {
            self.completed
        };
        calculate_bracket_round(self.order.len(), index)
    }

    pub fn progress(&self) -> ScheduleProgress {
        ScheduleProgress {
            comparisons: self.completed,
            min_appearances: self.appearances.iter().copied().min().unwrap_or(0),
        }
    }

    /// Matchup to serve now; `None` before seeding and after completion.
    pub fn current_matchup(&self) -> Option<Matchup> {
        if self.phase != SchedulerPhase::InProgress {
            return None;
        }
        Some(self.matchup_at(self.completed))
    }

    /// Consume the current matchup and return the next one, or `None` once the
    /// completion policy is satisfied.
    pub fn advance(&mut self) -> Option<Matchup> {
        if self.phase != SchedulerPhase::InProgress {
            return None;
        }
        let (left, right) = self.pair_positions(self.completed);
        self.appearances[left] += 1;
        self.appearances[right] += 1;
        self.completed += 1;

        if self.policy.is_satisfied(&self.progress()) {
            self.phase = SchedulerPhase::Complete;
            log::debug!("Scheduler complete after {} comparisons", self.completed);
            return None;
        }
        self.current_matchup()
    }

    /// Force completion (early abort).
    pub fn finish(&mut self) {
        self.phase = SchedulerPhase::Complete;
    }

    fn matchup_at(&self, index: u32) -> Matchup {
        let (left, right) = self.pair_positions(index);
        Matchup {
            left: self.order[left].clone(),
            right: self.order[right].clone(),
            round: calculate_bracket_round(self.order.len(), index),
            index,
        }
    }

    /// Seed positions `(left, right)` of the matchup at `index`. Never equal.
    fn pair_positions(&self, index: u32) -> (usize, usize) {
        let n = self.order.len();
        let per_round = n.div_ceil(2);
        let round = index as usize / per_round;
        let slot = index as usize % per_round;
        let pairs = round_pairs(n, round);
        let (a, b) = pairs[slot];
        // alternate sides every round so nobody is always shown on the left
        if round % 2 == 1 {
            (b, a)
        } else {
            (a, b)
        }
    }
}

/// Circle-method pairs for `round`, as seed positions. Odd counts use a phantom
/// seat; whoever draws it faces the first real candidate of the round instead.
fn round_pairs(n: usize, round: usize) -> Vec<(usize, usize)> {
    let seats = if n % 2 == 0 { n } else { n + 1 };
    let bye = n;
    let rotation = round % (seats - 1);

    let seat = |i: usize| -> usize {
        if i == 0 {
            0
        } else {
            1 + (i - 1 + rotation) % (seats - 1)
        }
    };

    let raw: Vec<(usize, usize)> = (0..seats / 2)
        .map(|k| (seat(k), seat(seats - 1 - k)))
        .collect();

    let anchor = raw
        .iter()
        .find(|(a, b)| *a != bye && *b != bye)
        .map(|(a, _)| *a)
        .unwrap_or(0);

    raw.into_iter()
        .map(|(a, b)| {
            if a == bye {
                (b, anchor)
            } else if b == bye {
                (a, anchor)
            } else {
                (a, b)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_round_advances_every_half_field() {
        assert_eq!(calculate_bracket_round(4, 0), 0);
        assert_eq!(calculate_bracket_round(4, 1), 0);
        assert_eq!(calculate_bracket_round(4, 2), 1);
        assert_eq!(calculate_bracket_round(5, 2), 0);
        assert_eq!(calculate_bracket_round(5, 3), 1);
        assert_eq!(calculate_bracket_round(2, 3), 3);
    }

    #[test]
    fn every_round_covers_every_candidate() {
        for n in 2..=9 {
            for round in 0..(2 * n) {
                let pairs = round_pairs(n, round);
                assert_eq!(pairs.len(), n.div_ceil(2));
                let mut seen = vec![false; n];
                for (a, b) in pairs {
                    assert_ne!(a, b, "self pairing for n={n} round={round}");
                    assert!(a < n && b < n);
                    seen[a] = true;
                    seen[b] = true;
                }
                assert!(seen.iter().all(|s| *s), "n={n} round={round}");
            }
        }
    }

    #[test]
    fn even_field_meets_everyone_once_per_cycle() {
        let n = 6;
        let mut met = std::collections::HashSet::new();
        for round in 0..n - 1 {
            for (a, b) in round_pairs(n, round) {
                met.insert((a.min(b), a.max(b)));
            }
        }
        assert_eq!(met.len(), n * (n - 1) / 2);
    }
}
