//! The two `Scorer` implementations.
//!
//! - **OptimizedScorer**: fold-in + hybrid scoring over the memory-mapped
//!   factor store
//! - **LegacyScorer**: per-pair estimates from the trained model object, used
//!   when the optimized artifacts are unavailable

pub mod legacy;
pub mod optimized;

pub use legacy::LegacyScorer;
pub use optimized::OptimizedScorer;

use data_loader::{MovieId, Rating};
use std::collections::HashSet;

/// Items the user has already rated
pub(crate) fn rated_items(ratings: &[Rating]) -> HashSet<MovieId> {
    ratings.iter().map(|r| r.movie_id.clone()).collect()
}
