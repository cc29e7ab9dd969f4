//! # Recommendation Engine
//!
//! The entry point requests go through. At startup the engine:
//! 1. Rebuilds any chunked artifacts (when configured)
//! 2. Loads the optimized factor store
//! 3. Falls back to the trained model object if the store is unavailable
//!
//! The chosen `Scorer` is kept behind an `Arc` and shared by every request.
//! Scoring is CPU-bound, so the async entry point runs it on the blocking
//! pool.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::{info, instrument, warn};

use data_loader::{Catalog, Genre, RatingStore, UserId};
use factor_store::{Availability, FactorStore, SvdModel, materialize};
use pipeline::{LegacyScorer, OptimizedScorer, RecommendationRequest, ScoredItem, Scorer};

use crate::config::EngineConfig;

/// Which scoring path the engine selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringPath {
    Optimized,
    Legacy,
}

#[derive(Clone)]
pub struct RecommendationEngine {
    scorer: Arc<dyn Scorer>,
    path: ScoringPath,
}

impl RecommendationEngine {
    /// Build the engine from configuration.
    ///
    /// Fails only when neither the optimized artifacts nor the legacy model
    /// can be used, or when an artifact exists but is corrupt.
    #[instrument(skip_all, fields(models_dir = %config.models_dir.display()))]
    pub fn from_config(
        config: &EngineConfig,
        catalog: Arc<dyn Catalog>,
        ratings: Arc<dyn RatingStore>,
    ) -> Result<Self> {
        config.validate()?;

        if config.materialize_chunks {
            let rebuilt = materialize::join_all_in_directory(&config.models_dir)
                .context("Failed to rebuild chunked artifacts")?;
            if rebuilt > 0 {
                info!("Rebuilt {} artifacts from chunks", rebuilt);
            }
        }

        let availability = FactorStore::load(&config.models_dir)
            .context("Optimized artifacts are present but unusable")?;

        match availability {
            Availability::Ready(store) => {
                let scorer = OptimizedScorer::new(Arc::new(store), catalog, ratings)
                    .with_fold_in(config.fold_in)?
                    .with_scale(config.scale);
                info!("Using optimized scoring path");
                Ok(Self {
                    scorer: Arc::new(scorer),
                    path: ScoringPath::Optimized,
                })
            }
            Availability::Unavailable { missing } => {
                if !config.legacy_model.exists() {
                    bail!(
                        "No scoring path available: missing {:?} and no model at {}",
                        missing,
                        config.legacy_model.display()
                    );
                }
                warn!(
                    model = %config.legacy_model.display(),
                    "Falling back to legacy scoring path"
                );
                let model = SvdModel::load(&config.legacy_model)
                    .context("Failed to load legacy model")?;
                let scorer = LegacyScorer::new(Arc::new(model), catalog, ratings)
                    .with_scale(config.scale);
                Ok(Self {
                    scorer: Arc::new(scorer),
                    path: ScoringPath::Legacy,
                })
            }
        }
    }

    pub fn path(&self) -> ScoringPath {
        self.path
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    /// Main entry point: ranked unrated items for a user
    ///
    /// # Arguments
    /// * `user_id` - The user to recommend for
    /// * `n` - Maximum number of items returned
    /// * `selected_genres` - Genres to blend in; empty for pure rating order
    /// * `alpha` - Weight of the rating estimate in the blend, within [0, 1]
    #[instrument(skip(self, selected_genres), fields(scorer = self.scorer.name()))]
    pub fn recommend(
        &self,
        user_id: &UserId,
        n: usize,
        selected_genres: &[Genre],
        alpha: f64,
    ) -> Result<Vec<ScoredItem>> {
        let start_time = Instant::now();

        let request = RecommendationRequest::new(n)
            .with_genres(selected_genres.iter().copied())
            .with_alpha(alpha);
        let items = self
            .scorer
            .score(user_id, &request)
            .with_context(|| format!("Failed to score recommendations for user {}", user_id))?;

        info!(
            "Selected {} recommendations for user {} in {:.2?}",
            items.len(),
            user_id,
            start_time.elapsed()
        );
        Ok(items)
    }

    /// `recommend` on tokio's blocking pool
    pub async fn recommend_async(
        &self,
        user_id: UserId,
        n: usize,
        selected_genres: Vec<Genre>,
        alpha: f64,
    ) -> Result<Vec<ScoredItem>> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.recommend(&user_id, n, &selected_genres, alpha))
            .await
            .context("Scoring task panicked")?
    }
}
