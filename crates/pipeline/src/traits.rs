//! Core trait for the scoring paths.
//!
//! The engine picks one `Scorer` at startup, depending on whether the
//! optimized factor artifacts could be loaded, and calls it for every request.

use crate::types::{RecommendationRequest, ScoredItem};
use anyhow::Result;
use data_loader::UserId;

/// Produces a ranked recommendation list for a user.
///
/// ## Design Note
/// - `Send + Sync` so one scorer can serve concurrent requests behind an `Arc`
/// - Implementations hold only shared read-only state; every call computes
///   its own per-request values
pub trait Scorer: Send + Sync {
    /// Returns the name of this scorer (for logging/debugging)
    fn name(&self) -> &str;

    /// Up to `request.n` items the user has not rated, best first.
    fn score(&self, user_id: &UserId, request: &RecommendationRequest) -> Result<Vec<ScoredItem>>;
}
