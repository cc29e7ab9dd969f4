//! Per-request values flowing through scoring.

use anyhow::{Result, bail};
use data_loader::{Genre, MovieId};
use serde::Serialize;

/// A user's personalized latent vector and bias, valid for one request
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub factors: Vec<f64>,
    pub bias: f64,
}

impl UserProfile {
    /// Zero vector and zero bias
    pub fn cold_start(n_factors: usize) -> Self {
        Self {
            factors: vec![0.0; n_factors],
            bias: 0.0,
        }
    }

    pub fn n_factors(&self) -> usize {
        self.factors.len()
    }
}

/// A scored item that has not been joined with catalog metadata yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub movie_id: MovieId,
    /// Inner index (optimized path) or catalog position (legacy path).
    /// Equal ranking scores are ordered by ascending position.
    pub position: usize,
    /// Rating estimate, clipped to the rating scale
    pub svd_score: f64,
    /// Only set when genres were selected
    pub hybrid_score: Option<f64>,
}

impl Candidate {
    /// The score ranking is based on
    pub fn ranking_score(&self) -> f64 {
        self.hybrid_score.unwrap_or(self.svd_score)
    }
}

/// One entry of a recommendation list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    pub movie_id: MovieId,
    pub title: String,
    pub genres: Vec<Genre>,
    pub svd_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid_score: Option<f64>,
}

/// What the caller asks for
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    pub n: usize,
    pub selected_genres: Vec<Genre>,
    /// Weight of the rating estimate in the hybrid blend
    pub alpha: f64,
}

impl RecommendationRequest {
    pub const DEFAULT_ALPHA: f64 = 0.5;

    pub fn new(n: usize) -> Self {
        Self {
            n,
            selected_genres: Vec::new(),
            alpha: Self::DEFAULT_ALPHA,
        }
    }

    pub fn with_genres(mut self, genres: impl IntoIterator<Item = Genre>) -> Self {
        self.selected_genres = genres.into_iter().collect();
        self.selected_genres.sort();
        self.selected_genres.dedup();
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn wants_hybrid(&self) -> bool {
        !self.selected_genres.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            bail!("alpha must be within [0, 1], got {}", self.alpha);
        }
        Ok(())
    }
}
