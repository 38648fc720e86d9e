//! Data structures for the pairwise tournament: candidates, ratings, matchups, session views.

mod candidate;
mod error;
mod matchup;
mod rating;
mod session;

pub use candidate::{Candidate, CandidateId};
pub use error::TournamentError;
pub use matchup::{Matchup, Outcome};
pub use rating::{Rating, RatingSnapshot};
pub use session::{SchedulerPhase, SessionId, SessionView, Standing, VoteResult};
