//! Tournament logic: rating store, Elo update, pair scheduling, session transitions, engine.

mod elo;
mod engine;
mod rating_store;
mod scheduler;
mod session;

pub use elo::{apply_vote, expected_score};
pub use engine::{EngineBuilder, TournamentEngine};
pub use rating_store::RatingStore;
pub use scheduler::{calculate_bracket_round, PairScheduler, ScheduleProgress};
pub use session::{abort_session, apply_session_vote, start_session, AppliedVote, TournamentSession};
