//! Fallback scoring with the trained model object.
//!
//! No fold-in and no genre blending: the model estimates every catalog item
//! for the user as it was trained, and `hybrid_score` is never set.

use crate::top_n::{enrich, select_top_n};
use crate::traits::Scorer;
use crate::types::{Candidate, RecommendationRequest, ScoredItem};
use anyhow::Result;
use data_loader::{Catalog, RatingScale, RatingStore, UserId};
use factor_store::SvdModel;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct LegacyScorer {
    model: Arc<SvdModel>,
    catalog: Arc<dyn Catalog>,
    ratings: Arc<dyn RatingStore>,
    scale: RatingScale,
}

impl LegacyScorer {
    pub fn new(
        model: Arc<SvdModel>,
        catalog: Arc<dyn Catalog>,
        ratings: Arc<dyn RatingStore>,
    ) -> Self {
        Self {
            model,
            catalog,
            ratings,
            scale: RatingScale::default(),
        }
    }

    pub fn with_scale(mut self, scale: RatingScale) -> Self {
        self.scale = scale;
        self
    }
}

impl Scorer for LegacyScorer {
    fn name(&self) -> &str {
        "LegacyScorer"
    }

    #[instrument(skip_all, fields(user_id = %user_id, n = request.n))]
    fn score(&self, user_id: &UserId, request: &RecommendationRequest) -> Result<Vec<ScoredItem>> {
        request.validate()?;
        if request.wants_hybrid() {
            debug!("Genre blending is not available on the legacy path");
        }

        let ratings = self.ratings.get_user_ratings(user_id);
        let rated = super::rated_items(ratings);

        let candidates: Vec<Candidate> = self
            .catalog
            .all_item_ids()
            .par_iter()
            .enumerate()
            .filter(|(_, id)| !rated.contains(*id))
            .map(|(position, id)| Candidate {
                movie_id: id.clone(),
                position,
                svd_score: self.scale.clip(self.model.estimate(user_id, id)),
                hybrid_score: None,
            })
            .collect();
        debug!(candidates = candidates.len(), "Estimated catalog");

        let top = select_top_n(candidates, &rated, request.n);
        Ok(enrich(top, self.catalog.as_ref()))
    }
}
