//! Tournament engine: one session plus the concurrency rules around it.
//!
//! - Only one `vote` may be in flight per session; a second concurrent call
//!   fails with `VoteInProgress` instead of queueing.
//! - Votes closer together than the cooldown fail with `VoteTooSoon`.
//! - `abort_early` waits for an in-flight vote to finish, never cuts it short.
//! - Every applied vote emits one `VoteRecorded` request; completion or abort
//!   emits one `SessionFinished`. Emission is fire-and-forget: a closed channel
//!   is logged, not returned.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::logic::session::{abort_session, apply_session_vote, start_session, TournamentSession};
use crate::models::{
    Candidate, CandidateId, Matchup, Outcome, Rating, RatingSnapshot, SessionId, SessionView,
    TournamentError, VoteResult,
};
use crate::sync::{OperationType, PersistRequest, RatingsPayload};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

struct EngineState {
    session: TournamentSession,
    last_vote_at: Option<chrono::DateTime<chrono::Utc>>,
    finish_emitted: bool,
}

pub struct TournamentEngine {
    id: SessionId,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    persist: Option<mpsc::Sender<PersistRequest>>,
    /// Held for the whole of a vote, including persistence hand-off.
    vote_gate: tokio::sync::Mutex<()>,
    /// Never held across an await.
    state: Mutex<EngineState>,
}

/// Collects the injectable pieces before a session starts.
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    persist: Option<mpsc::Sender<PersistRequest>>,
    judge: Option<String>,
    seed: Option<u64>,
}

impl EngineBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Where persistence requests go (usually a `SyncWorker`).
    pub fn persist_to(mut self, sender: mpsc::Sender<PersistRequest>) -> Self {
        self.persist = Some(sender);
        self
    }

    pub fn judge(mut self, judge: impl Into<String>) -> Self {
        self.judge = Some(judge.into());
        self
    }

    /// Shuffle seed; overrides `config.seed`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate candidates, seed ratings from `existing` (else the default), and
    /// shuffle. The first matchup is ready when this returns.
    pub fn start(
        self,
        candidates: Vec<Candidate>,
        existing: &HashMap<CandidateId, Rating>,
    ) -> Result<TournamentEngine, TournamentError> {
        let mut rng = match self.seed.or(self.config.seed) {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let session = start_session(
            candidates,
            existing,
            &self.config,
            self.judge,
            self.clock.now(),
            &mut rng,
        )?;
        Ok(TournamentEngine {
            id: session.id,
            config: self.config,
            clock: self.clock,
            persist: self.persist,
            vote_gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(EngineState {
                session,
                last_vote_at: None,
                finish_emitted: false,
            }),
        })
    }
}

impl TournamentEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            clock: Arc::new(SystemClock),
            persist: None,
            judge: None,
            seed: None,
        }
    }

    /// Start with the system clock and no persistence hand-off.
    pub fn start(
        candidates: Vec<Candidate>,
        existing: &HashMap<CandidateId, Rating>,
        config: EngineConfig,
    ) -> Result<Self, TournamentError> {
        Self::builder(config).start(candidates, existing)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` only once the session is complete.
    pub fn current_match(&self) -> Option<Matchup> {
        self.lock_state().session.current_match()
    }

    pub fn is_complete(&self) -> bool {
        self.lock_state().session.is_complete()
    }

    pub fn rating(&self, id: &str) -> Result<Rating, TournamentError> {
        self.lock_state().session.rating(id)
    }

    pub fn ratings(&self) -> RatingSnapshot {
        self.lock_state().session.ratings()
    }

    pub fn view(&self) -> SessionView {
        self.lock_state().session.view()
    }

    /// True while a vote holds the gate.
    pub fn vote_in_flight(&self) -> bool {
        self.vote_gate.try_lock().is_err()
    }

    /// Apply `outcome` to the current matchup and advance. The rating update is
    /// visible as soon as this returns; delivery happens in the background.
    pub async fn vote(&self, outcome: Outcome) -> Result<VoteResult, TournamentError> {
        let _gate = self
            .vote_gate
            .try_lock()
            .map_err(|_| TournamentError::VoteInProgress)?;

        let (requests, result) = {
            let mut state = self.lock_state();
            let now = self.clock.now();
            if let Some(last) = state.last_vote_at {
                let cooldown_ms = i64::try_from(self.config.vote_cooldown_ms).unwrap_or(i64::MAX);
                let elapsed_ms = (now - last).num_milliseconds();
                if elapsed_ms < cooldown_ms {
                    return Err(TournamentError::VoteTooSoon {
                        retry_after_ms: (cooldown_ms - elapsed_ms.max(0)) as u64,
                    });
                }
            }

            let applied = apply_session_vote(&mut state.session, outcome)?;
            state.last_vote_at = Some(now);

            let mut requests = vec![self.request(
                &state.session,
                OperationType::VoteRecorded,
                applied.changed_ratings(),
            )];
            if applied.result.is_completed() && !state.finish_emitted {
                state.finish_emitted = true;
                requests.push(self.request(
                    &state.session,
                    OperationType::SessionFinished,
                    state.session.ratings(),
                ));
            }
            (requests, applied.result)
        };

        for request in requests {
            self.emit(request).await;
        }
        Ok(result)
    }

    /// Parse a wire outcome (`"left"`, `"right"`, `"both"`, `"neither"`) and vote.
    pub async fn vote_named(&self, outcome: &str) -> Result<VoteResult, TournamentError> {
        let outcome: Outcome = outcome.parse()?;
        self.vote(outcome).await
    }

    /// End the session now with the ratings as they stand. Waits for an in-flight
    /// vote first. Emits `SessionFinished` unless the session already finished.
    pub async fn abort_early(&self) -> RatingSnapshot {
        let _gate = self.vote_gate.lock().await;
        let (snapshot, request) = {
            let mut state = self.lock_state();
            let snapshot = abort_session(&mut state.session);
            let request = if state.finish_emitted {
                None
            } else {
                state.finish_emitted = true;
                Some(self.request(
                    &state.session,
                    OperationType::SessionFinished,
                    snapshot.clone(),
                ))
            };
            (snapshot, request)
        };
        if let Some(request) = request {
            self.emit(request).await;
        }
        snapshot
    }

    fn request(
        &self,
        session: &TournamentSession,
        operation: OperationType,
        ratings: RatingSnapshot,
    ) -> PersistRequest {
        PersistRequest {
            operation,
            payload: RatingsPayload {
                session_id: session.id,
                judge: session.judge.clone(),
                ratings,
            },
        }
    }

    async fn emit(&self, request: PersistRequest) {
        let Some(sender) = &self.persist else {
            return;
        };
        if let Err(e) = sender.send(request).await {
            log::warn!(
                "Session {}: persistence channel closed, dropping {:?} write",
                self.id,
                e.0.operation
            );
        }
    }
}
