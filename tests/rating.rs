//! Integration tests for the Elo update and the rating store.

use pairwise_tournament::{
    apply_vote, expected_score, Outcome, Rating, RatingConfig, RatingStore, TournamentError,
};

const GRID: [f64; 6] = [800.0, 1100.0, 1500.0, 1501.0, 1900.0, 2400.0];

#[test]
fn swapping_sides_and_mirroring_outcome_swaps_results() {
    let config = RatingConfig::default();
    for &a in &GRID {
        for &b in &GRID {
            for outcome in Outcome::ALL {
                let ra = Rating::with_record(a, 2, 1);
                let rb = Rating::with_record(b, 0, 4);
                let (l, r) = apply_vote(ra, rb, outcome, &config);
                let (ml, mr) = apply_vote(rb, ra, outcome.mirror(), &config);
                assert_eq!((l, r), (mr, ml), "a={a} b={b} outcome={outcome}");
            }
        }
    }
}

#[test]
fn results_stay_inside_clamp_for_extreme_inputs() {
    let config = RatingConfig {
        k_factor: 1_000_000.0,
        ..RatingConfig::default()
    };
    let extremes = [-50_000.0, 0.0, 799.0, 1500.0, 2401.0, 1e9];
    for &a in &extremes {
        for &b in &extremes {
            for outcome in Outcome::ALL {
                let (l, r) = apply_vote(Rating::seeded(a), Rating::seeded(b), outcome, &config);
                for value in [l.value, r.value] {
                    assert!(
                        (800.0..=2400.0).contains(&value),
                        "a={a} b={b} outcome={outcome} -> {value}"
                    );
                }
            }
        }
    }
}

#[test]
fn neither_wins_changes_nothing() {
    let config = RatingConfig::default();
    let left = Rating::with_record(1620.0, 4, 2);
    let right = Rating::with_record(1380.0, 1, 5);
    let (l, r) = apply_vote(left, right, Outcome::NeitherWins, &config);
    assert_eq!(l, left);
    assert_eq!(r, right);
}

#[test]
fn both_win_rewards_both_without_losses() {
    let config = RatingConfig::default();
    let left = Rating::with_record(1500.0, 1, 1);
    let right = Rating::with_record(1700.0, 0, 0);
    let (l, r) = apply_vote(left, right, Outcome::BothWin, &config);
    assert_eq!((l.wins, l.losses), (2, 1));
    assert_eq!((r.wins, r.losses), (1, 0));
    assert!(l.value > left.value);
    assert!(r.value > right.value);
    // the underdog gains more than the favourite
    assert!(l.value - left.value > r.value - right.value);
}

#[test]
fn decisive_outcomes_move_counters_one_each() {
    let config = RatingConfig::default();
    let (l, r) = apply_vote(Rating::seeded(1500.0), Rating::seeded(1500.0), Outcome::RightWins, &config);
    assert_eq!((l.wins, l.losses), (0, 1));
    assert_eq!((r.wins, r.losses), (1, 0));
    assert!(l.value < 1500.0);
    assert!(r.value > 1500.0);
}

#[test]
fn counters_at_their_limit_saturate() {
    let config = RatingConfig::default();
    let veteran = Rating::with_record(1500.0, u32::MAX, u32::MAX);
    let (l, r) = apply_vote(veteran, veteran, Outcome::BothWin, &config);
    assert_eq!(l.wins, u32::MAX);
    assert_eq!(r.wins, u32::MAX);
    let (l, _) = apply_vote(veteran, Rating::seeded(1500.0), Outcome::RightWins, &config);
    assert_eq!(l.losses, u32::MAX);
    assert_eq!(veteran.decided(), u32::MAX);
}

#[test]
fn upset_against_near_ceiling_stays_in_bounds() {
    let config = RatingConfig::default();
    let a = Rating::with_record(2380.0, 5, 0);
    let b = Rating::seeded(1500.0);
    let (new_a, new_b) = apply_vote(a, b, Outcome::RightWins, &config);
    assert!(new_a.value < a.value && new_a.value >= 800.0);
    assert!(new_b.value > b.value && new_b.value <= 2400.0);
    assert_eq!(new_a.losses, 1);
    assert_eq!(new_b.wins, 1);
}

#[test]
fn win_at_the_ceiling_is_clamped_not_rejected() {
    let config = RatingConfig::default();
    let (l, r) = apply_vote(Rating::seeded(2400.0), Rating::seeded(800.0), Outcome::LeftWins, &config);
    assert_eq!(l.value, 2400.0);
    assert_eq!(r.value, 800.0);
    assert_eq!((l.wins, r.losses), (1, 1));
    assert!(expected_score(2400.0, 800.0) > 0.99);
}

#[test]
fn outcome_parsing_accepts_wire_names_and_rejects_others() {
    assert_eq!("left".parse::<Outcome>(), Ok(Outcome::LeftWins));
    assert_eq!("RightWins".parse::<Outcome>(), Ok(Outcome::RightWins));
    assert_eq!("both_win".parse::<Outcome>(), Ok(Outcome::BothWin));
    assert_eq!(" Neither ".parse::<Outcome>(), Ok(Outcome::NeitherWins));
    assert_eq!(
        "draw".parse::<Outcome>(),
        Err(TournamentError::InvalidOutcome("draw".to_string()))
    );
    let parsed: Outcome = serde_json::from_str("\"both\"").unwrap();
    assert_eq!(parsed, Outcome::BothWin);
    assert!(serde_json::from_str::<Outcome>("\"sideways\"").is_err());
}

#[test]
fn store_snapshot_reflects_sets() {
    let mut store = RatingStore::new(RatingConfig::default());
    store.register("a", None);
    store.register("b", Some(Rating::with_record(1600.0, 2, 0)));
    store.set("a", Rating::with_record(1550.0, 1, 0)).unwrap();
    assert!(matches!(
        store.set("zzz", Rating::seeded(1500.0)),
        Err(TournamentError::NotFound(_))
    ));

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot["a"], Rating::with_record(1550.0, 1, 0));
    assert_eq!(snapshot["b"].value, 1600.0);

    let board: Vec<_> = store.leaderboard().into_iter().map(|(id, _)| id).collect();
    assert_eq!(board, vec!["b", "a"]);
}
