//! Scoring against the optimized factor store.

use crate::fold_in::{FoldInConfig, FoldInSolver};
use crate::hybrid::HybridScorer;
use crate::top_n::{enrich, select_top_n};
use crate::traits::Scorer;
use crate::types::{RecommendationRequest, ScoredItem};
use anyhow::{Context, Result};
use data_loader::{Catalog, RatingScale, RatingStore, UserId};
use factor_store::FactorStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

/// Fold-in, score the catalog, select, join.
#[derive(Clone)]
pub struct OptimizedScorer {
    store: Arc<FactorStore>,
    catalog: Arc<dyn Catalog>,
    ratings: Arc<dyn RatingStore>,
    solver: FoldInSolver,
    hybrid: HybridScorer,
}

impl OptimizedScorer {
    pub fn new(
        store: Arc<FactorStore>,
        catalog: Arc<dyn Catalog>,
        ratings: Arc<dyn RatingStore>,
    ) -> Self {
        Self {
            store,
            catalog,
            ratings,
            solver: FoldInSolver::default(),
            hybrid: HybridScorer::new(RatingScale::default()),
        }
    }

    pub fn with_fold_in(mut self, config: FoldInConfig) -> Result<Self> {
        self.solver = FoldInSolver::new(config)?;
        Ok(self)
    }

    pub fn with_scale(mut self, scale: RatingScale) -> Self {
        self.hybrid = HybridScorer::new(scale);
        self
    }
}

impl Scorer for OptimizedScorer {
    fn name(&self) -> &str {
        "OptimizedScorer"
    }

    #[instrument(skip_all, fields(user_id = %user_id, n = request.n))]
    fn score(&self, user_id: &UserId, request: &RecommendationRequest) -> Result<Vec<ScoredItem>> {
        request.validate()?;
        let ratings = self.ratings.get_user_ratings(user_id);

        let start = Instant::now();
        let profile = self
            .solver
            .fold_in(&self.store, ratings)
            .with_context(|| format!("Fold-in failed for user {}", user_id))?;
        debug!(ratings = ratings.len(), "Fold-in done in {:?}", start.elapsed());

        let start = Instant::now();
        let candidates = self
            .hybrid
            .score_all(&self.store, self.catalog.as_ref(), &profile, request)?;
        debug!(
            candidates = candidates.len(),
            hybrid = request.wants_hybrid(),
            "Scored catalog in {:?}",
            start.elapsed()
        );

        let top = select_top_n(candidates, &super::rated_items(ratings), request.n);
        let items = enrich(top, self.catalog.as_ref());
        debug!(returned = items.len(), "Selected top items");

        Ok(items)
    }
}
