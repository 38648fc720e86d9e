//! Elo update for a single vote. Pure: no I/O, no shared state.

use crate::config::RatingConfig;
use crate::models::{Outcome, Rating};

/// Expected score of a candidate rated `rating` against one rated `opponent`.
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((opponent - rating) / 400.0))
}

/// Apply `outcome` to the two sides of a matchup and return the new ratings.
///
/// - `LeftWins` / `RightWins`: standard Elo, winner's `wins` and loser's `losses` go up.
/// - `BothWin`: both sides are scored as winners (not a zero-sum draw); both `wins` go up.
/// - `NeitherWins`: a skip; ratings and counters are unchanged.
///
/// New values are clamped to `[config.min, config.max]`.
pub fn apply_vote(
    left: Rating,
    right: Rating,
    outcome: Outcome,
    config: &RatingConfig,
) -> (Rating, Rating) {
    let mut new_left = left;
    let mut new_right = right;

    if outcome != Outcome::NeitherWins {
        let expected_left = expected_score(left.value, right.value);
        let expected_right = expected_score(right.value, left.value);
        let (score_left, score_right) = outcome.scores();
        new_left.value = left.value + config.k_factor * (score_left - expected_left);
        new_right.value = right.value + config.k_factor * (score_right - expected_right);
    }

    new_left.value = config.clamp(new_left.value);
    new_right.value = config.clamp(new_right.value);

    match outcome {
        Outcome::LeftWins => {
            new_left.add_win();
            new_right.add_loss();
        }
        Outcome::RightWins => {
            new_left.add_loss();
            new_right.add_win();
        }
        Outcome::BothWin => {
            new_left.add_win();
            new_right.add_win();
        }
        Outcome::NeitherWins => {}
    }

    (new_left, new_right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratings_expect_half() {
        assert!((expected_score(1500.0, 1500.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn win_between_equals_moves_half_k() {
        let config = RatingConfig::default();
        let (l, r) = apply_vote(
            Rating::seeded(1500.0),
            Rating::seeded(1500.0),
            Outcome::LeftWins,
            &config,
        );
        assert!((l.value - 1516.0).abs() < 1e-9);
        assert!((r.value - 1484.0).abs() < 1e-9);
    }
}
