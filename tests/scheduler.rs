//! Integration tests for pair scheduling and completion policies.

use pairwise_tournament::{
    calculate_bracket_round, Candidate, CompletionPolicy, Matchup, PairScheduler, SchedulerPhase,
    TournamentError,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn candidates(n: usize) -> Vec<Candidate> {
    (0..n).map(|i| Candidate::labelled(format!("C{i}"))).collect()
}

fn seeded(n: usize, policy: CompletionPolicy, seed: u64) -> PairScheduler {
    let mut scheduler = PairScheduler::new(candidates(n), policy).unwrap();
    scheduler.seed(&mut StdRng::seed_from_u64(seed));
    scheduler
}

/// Serve and consume matchups until completion; panics past `bound`.
fn run_to_completion(scheduler: &mut PairScheduler, bound: usize) -> Vec<Matchup> {
    let mut served = Vec::new();
    let mut current = scheduler.current_matchup();
    while let Some(matchup) = current {
        assert!(served.len() < bound, "no completion within {bound} matchups");
        served.push(matchup);
        current = scheduler.advance();
    }
    served
}

#[test]
fn fewer_than_two_candidates_fails_fast() {
    for n in 0..2 {
        assert_eq!(
            PairScheduler::new(candidates(n), CompletionPolicy::default()).err(),
            Some(TournamentError::InsufficientCandidates { found: n })
        );
    }
}

#[test]
fn nothing_is_served_before_seeding() {
    let scheduler = PairScheduler::new(candidates(4), CompletionPolicy::default()).unwrap();
    assert_eq!(scheduler.phase(), SchedulerPhase::Seeding);
    assert!(scheduler.current_matchup().is_none());
}

#[test]
fn shuffle_happens_exactly_once() {
    let mut scheduler = seeded(8, CompletionPolicy::default(), 3);
    let order = scheduler.order().to_vec();
    scheduler.seed(&mut StdRng::seed_from_u64(99));
    assert_eq!(scheduler.order(), order.as_slice());
    assert_eq!(scheduler.phase(), SchedulerPhase::InProgress);
}

#[test]
fn same_seed_reproduces_the_session() {
    let policy = CompletionPolicy::MinAppearances { per_candidate: 3 };
    let a = run_to_completion(&mut seeded(7, policy, 42), 1_000);
    let b = run_to_completion(&mut seeded(7, policy, 42), 1_000);
    assert_eq!(a, b);
}

#[test]
fn no_candidate_ever_faces_itself() {
    for n in 2..=11 {
        for seed in 0..5 {
            let mut scheduler = seeded(n, CompletionPolicy::FixedComparisons { total: 60 }, seed);
            for matchup in run_to_completion(&mut scheduler, 60) {
                assert_ne!(matchup.left.id, matchup.right.id, "n={n} seed={seed}");
            }
        }
    }
}

#[test]
fn fixed_budget_completes_after_exactly_that_many_votes() {
    for n in 2..=9 {
        let mut scheduler = seeded(n, CompletionPolicy::FixedComparisons { total: 13 }, 1);
        let served = run_to_completion(&mut scheduler, 13);
        assert_eq!(served.len(), 13);
        assert!(scheduler.is_complete());
        assert!(scheduler.current_matchup().is_none());
        assert!(scheduler.advance().is_none());
    }
}

#[test]
fn min_appearances_completes_within_one_round_per_appearance() {
    for n in 2..=9 {
        for per_candidate in 1..=3u32 {
            let policy = CompletionPolicy::MinAppearances { per_candidate };
            let mut scheduler = seeded(n, policy, 5);
            let bound = per_candidate as usize * n.div_ceil(2);
            let served = run_to_completion(&mut scheduler, bound);

            for candidate in candidates(n) {
                let count = served.iter().filter(|m| m.involves(&candidate.id)).count();
                assert!(
                    count >= per_candidate as usize,
                    "n={n} per_candidate={per_candidate} {} appeared {count}x",
                    candidate.id
                );
            }
            assert_eq!(scheduler.progress().comparisons as usize, served.len());
        }
    }
}

#[test]
fn rounds_advance_every_half_field() {
    let mut scheduler = seeded(5, CompletionPolicy::FixedComparisons { total: 9 }, 8);
    let served = run_to_completion(&mut scheduler, 9);
    let rounds: Vec<u32> = served.iter().map(|m| m.round).collect();
    assert_eq!(rounds, vec![0, 0, 0, 1, 1, 1, 2, 2, 2]);
    for (i, m) in served.iter().enumerate() {
        assert_eq!(m.index as usize, i);
        assert_eq!(m.round, calculate_bracket_round(5, m.index));
    }
}

#[test]
fn current_matchup_is_stable_until_consumed() {
    let scheduler = seeded(6, CompletionPolicy::default(), 11);
    assert_eq!(scheduler.current_matchup(), scheduler.current_matchup());
}

#[test]
fn finish_forces_completion() {
    let mut scheduler = seeded(4, CompletionPolicy::default(), 2);
    scheduler.advance();
    scheduler.finish();
    assert!(scheduler.is_complete());
    assert!(scheduler.current_matchup().is_none());
    assert_eq!(scheduler.current_round(), 0);
}
