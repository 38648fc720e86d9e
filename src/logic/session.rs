//! Tournament session: the aggregate the engine owns, and its transitions
//! (start, vote, abort). Everything here is synchronous and single-owner.

use crate::config::{EngineConfig, RatingConfig};
use crate::logic::elo::apply_vote;
use crate::logic::rating_store::RatingStore;
use crate::logic::scheduler::PairScheduler;
use crate::models::{
    Candidate, CandidateId, Matchup, Outcome, Rating, RatingSnapshot, SchedulerPhase, SessionId,
    SessionView, Standing, TournamentError, VoteResult,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// One judge's run through a candidate set.
#[derive(Clone, Debug)]
pub struct TournamentSession {
    pub id: SessionId,
    /// Who is voting (shown in persistence payloads).
    pub judge: Option<String>,
    pub started_at: DateTime<Utc>,
    rating_config: RatingConfig,
    store: RatingStore,
    scheduler: PairScheduler,
    votes_applied: u32,
}

/// Everything a single applied vote changed, for the persistence event.
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedVote {
    pub matchup: Matchup,
    pub outcome: Outcome,
    pub left: Rating,
    pub right: Rating,
    pub result: VoteResult,
}

impl AppliedVote {
    /// The two updated ratings keyed by candidate id.
    pub fn changed_ratings(&self) -> RatingSnapshot {
        RatingSnapshot::from([
            (self.matchup.left.id.clone(), self.left),
            (self.matchup.right.id.clone(), self.right),
        ])
    }
}

impl TournamentSession {
    pub fn current_match(&self) -> Option<Matchup> {
        self.scheduler.current_matchup()
    }

    pub fn is_complete(&self) -> bool {
        self.scheduler.is_complete()
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.scheduler.phase()
    }

    pub fn round(&self) -> u32 {
        self.scheduler.current_round()
    }

    pub fn votes_applied(&self) -> u32 {
        self.votes_applied
    }

    /// Candidates in seed order.
    pub fn candidates(&self) -> &[Candidate] {
        self.scheduler.order()
    }

    pub fn rating(&self, id: &str) -> Result<Rating, TournamentError> {
        self.store.get(id)
    }

    pub fn ratings(&self) -> RatingSnapshot {
        self.store.snapshot()
    }

    pub fn store(&self) -> &RatingStore {
        &self.store
    }

    /// Final ranking: highest rating first, ties in seed order.
    pub fn standings(&self) -> Vec<Standing> {
        let labels: HashMap<&str, &Candidate> = self
            .scheduler
            .order()
            .iter()
            .map(|c| (c.id.as_str(), c))
            .collect();
        self.store
            .leaderboard()
            .into_iter()
            .filter_map(|(id, rating)| {
                labels.get(id.as_str()).map(|c| Standing {
                    candidate: (*c).clone(),
                    rating: rating.value,
                    wins: rating.wins,
                    losses: rating.losses,
                })
            })
            .collect()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            judge: self.judge.clone(),
            phase: self.phase(),
            complete: self.is_complete(),
            round: self.round(),
            votes_applied: self.votes_applied,
            current_match: self.current_match(),
            standings: self.standings(),
        }
    }
}

/// Validate the candidate list, seed the rating store (carry-over or default) and
/// shuffle once so the first matchup is ready.
///
/// Empty or duplicate-id lists fail with `InvalidInput`; a single candidate fails
/// with `InsufficientCandidates`. Prior ratings for ids not in the list are ignored.
pub fn start_session<R: Rng + ?Sized>(
    candidates: Vec<Candidate>,
    existing: &HashMap<CandidateId, Rating>,
    config: &EngineConfig,
    judge: Option<String>,
    started_at: DateTime<Utc>,
    rng: &mut R,
) -> Result<TournamentSession, TournamentError> {
    config.validate()?;
    validate_candidates(&candidates)?;

    let mut scheduler = PairScheduler::new(candidates, config.completion)?;
    scheduler.seed(rng);

    let mut store = RatingStore::new(config.rating.clone());
    for candidate in scheduler.order() {
        store.register(candidate.id.clone(), existing.get(&candidate.id).copied());
    }

    let judge = judge
        .map(|j| j.trim().to_string())
        .filter(|j| !j.is_empty());

    let session = TournamentSession {
        id: Uuid::new_v4(),
        judge,
        started_at,
        rating_config: config.rating.clone(),
        store,
        scheduler,
        votes_applied: 0,
    };
    log::info!(
        "Started session {} with {} candidates ({} carried over)",
        session.id,
        session.store.len(),
        session
            .candidates()
            .iter()
            .filter(|c| existing.contains_key(&c.id))
            .count()
    );
    Ok(session)
}

fn validate_candidates(candidates: &[Candidate]) -> Result<(), TournamentError> {
    if candidates.is_empty() {
        return Err(TournamentError::InvalidInput(
            "candidate list is empty".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for candidate in candidates {
        if candidate.id.trim().is_empty() {
            return Err(TournamentError::InvalidInput(
                "candidate id must not be blank".to_string(),
            ));
        }
        if !seen.insert(candidate.id.as_str()) {
            return Err(TournamentError::InvalidInput(format!(
                "duplicate candidate id {:?}",
                candidate.id
            )));
        }
    }
    if candidates.len() < 2 {
        return Err(TournamentError::InsufficientCandidates {
            found: candidates.len(),
        });
    }
    Ok(())
}

/// Apply `outcome` to the current matchup, update both ratings, and advance the
/// scheduler. Returns what changed so the caller can persist it.
pub fn apply_session_vote(
    session: &mut TournamentSession,
    outcome: Outcome,
) -> Result<AppliedVote, TournamentError> {
    let matchup = session
        .scheduler
        .current_matchup()
        .ok_or(TournamentError::SessionComplete)?;

    let left = session.store.get(&matchup.left.id)?;
    let right = session.store.get(&matchup.right.id)?;
    let (new_left, new_right) = apply_vote(left, right, outcome, &session.rating_config);
    session.store.set(&matchup.left.id, new_left)?;
    session.store.set(&matchup.right.id, new_right)?;
    session.votes_applied += 1;

    log::debug!(
        "Session {} match #{}: {} vs {} -> {} ({:.1} / {:.1})",
        session.id,
        matchup.index,
        matchup.left.label,
        matchup.right.label,
        outcome,
        new_left.value,
        new_right.value
    );

    let result = match session.scheduler.advance() {
        Some(next) => VoteResult::Next { matchup: next },
        None => {
            log::info!(
                "Session {} complete after {} votes",
                session.id,
                session.votes_applied
            );
            VoteResult::Completed {
                final_ratings: session.store.snapshot(),
            }
        }
    };

    Ok(AppliedVote {
        matchup,
        outcome,
        left: new_left,
        right: new_right,
        result,
    })
}

/// Force completion with the ratings as they stand. Unfinished candidates are
/// not penalised. Returns the final snapshot; calling it twice is harmless.
pub fn abort_session(session: &mut TournamentSession) -> RatingSnapshot {
    if !session.scheduler.is_complete() {
        session.scheduler.finish();
        log::info!(
            "Session {} ended early after {} votes",
            session.id,
            session.votes_applied
        );
    }
    session.store.snapshot()
}
