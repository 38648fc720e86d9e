//! Pairwise-comparison tournament engine: schedules head-to-head matchups,
//! turns votes into Elo ratings, detects completion, and delivers rating
//! writes through a durable outbox that survives connectivity loss.

pub mod clock;
pub mod config;
pub mod logic;
pub mod models;
pub mod sync;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, CompletionPolicy, EngineConfig, RatingConfig, SyncConfig};
pub use logic::{
    abort_session, apply_session_vote, apply_vote, calculate_bracket_round, expected_score,
    start_session, AppliedVote, EngineBuilder, PairScheduler, RatingStore, ScheduleProgress,
    TournamentEngine, TournamentSession,
};
pub use models::{
    Candidate, CandidateId, Matchup, Outcome, Rating, RatingSnapshot, SchedulerPhase, SessionId,
    SessionView, Standing, TournamentError, VoteResult,
};
pub use sync::{
    EntryState, FlushReport, JsonFilePersistence, JsonFileStore, MemoryStore, OperationType,
    OutboxEntry, OutboxEntryId, OutboxStore, PersistRequest, PersistenceError,
    PersistenceErrorKind, RatingsPayload, RatingsPersistence, SyncQueue, SyncStatus, SyncWorker,
    PERSIST_CHANNEL_CAPACITY,
};
