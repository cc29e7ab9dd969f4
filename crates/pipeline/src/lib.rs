//! Scoring pipeline: from a user's ratings to a ranked list.
//!
//! This crate provides:
//! - `FoldInSolver` for per-request user vectors
//! - `HybridScorer` for clipped rating estimates and genre blending
//! - Top-N selection and the catalog join
//! - The `Scorer` trait with an optimized and a legacy implementation
//!
//! ## Architecture
//! A request passes through these stages:
//! 1. Fold-in fits `(factors, bias)` to the user's current ratings
//! 2. Every catalog item the factor store knows gets a clipped rating
//!    estimate, blended with genre coverage when genres are selected
//! 3. Rated items are excluded and the N best are selected
//! 4. Survivors are joined with titles and genres from the catalog
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{OptimizedScorer, RecommendationRequest, Scorer};
//!
//! let scorer = OptimizedScorer::new(store, catalog, ratings)
//!     .with_fold_in(FoldInConfig::default().with_epochs(20))?;
//!
//! let request = RecommendationRequest::new(10).with_genres([Genre::Comedy]);
//! let items = scorer.score(&RawId::Int(1), &request)?;
//! ```

pub mod fold_in;
pub mod hybrid;
pub mod scorers;
pub mod top_n;
pub mod traits;
pub mod types;

// Re-export main types
pub use fold_in::{FoldInConfig, FoldInSolver};
pub use hybrid::HybridScorer;
pub use scorers::{LegacyScorer, OptimizedScorer};
pub use traits::Scorer;
pub use types::{Candidate, RecommendationRequest, ScoredItem, UserProfile};
