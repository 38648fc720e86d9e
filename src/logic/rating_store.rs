//! In-memory rating table for one session.

use crate::config::RatingConfig;
use crate::models::{CandidateId, Rating, RatingSnapshot, TournamentError};
use std::collections::HashMap;

/// Ratings keyed by candidate id. Every write goes through the clamp.
#[derive(Clone, Debug)]
pub struct RatingStore {
    ratings: HashMap<CandidateId, Rating>,
    /// Registration order, used to break rating ties in the leaderboard.
    order: Vec<CandidateId>,
    bounds: RatingConfig,
}

impl RatingStore {
    pub fn new(bounds: RatingConfig) -> Self {
        Self {
            ratings: HashMap::new(),
            order: Vec::new(),
            bounds,
        }
    }

    /// Register a candidate with its carried-over rating, or the default seed.
    /// Re-registering keeps the first registration's position.
    pub fn register(&mut self, id: impl Into<CandidateId>, prior: Option<Rating>) {
        let id = id.into();
        let mut rating = prior.unwrap_or_else(|| Rating::seeded(self.bounds.default_rating));
        rating.value = self.bounds.clamp(rating.value);
        if self.ratings.insert(id.clone(), rating).is_none() {
            self.order.push(id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ratings.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<Rating, TournamentError> {
        self.ratings
            .get(id)
            .copied()
            .ok_or_else(|| TournamentError::NotFound(id.to_string()))
    }

    /// Replace a registered candidate's rating. The value is clamped; nothing else is checked.
    pub fn set(&mut self, id: &str, rating: Rating) -> Result<(), TournamentError> {
        let slot = self
            .ratings
            .get_mut(id)
            .ok_or_else(|| TournamentError::NotFound(id.to_string()))?;
        *slot = Rating {
            value: self.bounds.clamp(rating.value),
            ..rating
        };
        Ok(())
    }

    pub fn snapshot(&self) -> RatingSnapshot {
        self.ratings
            .iter()
            .map(|(id, rating)| (id.clone(), *rating))
            .collect()
    }

    /// Ratings for the given ids only (missing ids are skipped).
    pub fn subset<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> RatingSnapshot {
        ids.into_iter()
            .filter_map(|id| self.ratings.get(id).map(|r| (id.to_string(), *r)))
            .collect()
    }

    /// Highest rating first; equal ratings keep registration order.
    pub fn leaderboard(&self) -> Vec<(CandidateId, Rating)> {
        let mut entries: Vec<(CandidateId, Rating)> = self
            .order
            .iter()
            .filter_map(|id| self.ratings.get(id).map(|r| (id.clone(), *r)))
            .collect();
        // sort_by is stable, so ties stay in registration order
        entries.sort_by(|a, b| {
            b.1.value
                .partial_cmp(&a.1.value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_candidate_is_not_found() {
        let store = RatingStore::new(RatingConfig::default());
        assert_eq!(
            store.get("ghost"),
            Err(TournamentError::NotFound("ghost".to_string()))
        );
    }

    #[test]
    fn register_seeds_default_and_clamps_prior() {
        let mut store = RatingStore::new(RatingConfig::default());
        store.register("a", None);
        store.register("b", Some(Rating::with_record(9000.0, 3, 1)));
        assert_eq!(store.get("a").unwrap().value, 1500.0);
        let b = store.get("b").unwrap();
        assert_eq!(b.value, 2400.0);
        assert_eq!((b.wins, b.losses), (3, 1));
    }

    #[test]
    fn set_clamps_and_leaderboard_breaks_ties_by_order() {
        let mut store = RatingStore::new(RatingConfig::default());
        for id in ["x", "y", "z"] {
            store.register(id, None);
        }
        store.set("z", Rating::seeded(100.0)).unwrap();
        assert_eq!(store.get("z").unwrap().value, 800.0);

        let ids: Vec<_> = store.leaderboard().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }
}
