//! Interfaces the scoring engine consumes.
//!
//! The engine only ever reads the catalog and the rating store, so both are
//! expressed as read-only traits. `DataIndex` implements both; a database
//! backed store can implement them too without touching the engine.

use crate::types::{DataIndex, Movie, MovieId, Rating, UserId};

/// Source of a user's current ratings.
///
/// ## Contract
/// Repeated calls for an unchanged rating set must return the same order:
/// fold-in is order dependent in floating point.
pub trait RatingStore: Send + Sync {
    fn get_user_ratings(&self, user_id: &UserId) -> &[Rating];
}

/// Item metadata: titles and genres.
pub trait Catalog: Send + Sync {
    /// Metadata for an item, `None` when the catalog does not know it
    fn lookup(&self, movie_id: &MovieId) -> Option<&Movie>;

    /// Every catalog item, in a stable order
    fn all_item_ids(&self) -> &[MovieId];
}

impl RatingStore for DataIndex {
    fn get_user_ratings(&self, user_id: &UserId) -> &[Rating] {
        DataIndex::get_user_ratings(self, user_id)
    }
}

impl Catalog for DataIndex {
    fn lookup(&self, movie_id: &MovieId) -> Option<&Movie> {
        self.get_movie(movie_id)
    }

    fn all_item_ids(&self) -> &[MovieId] {
        self.all_movie_ids()
    }
}
