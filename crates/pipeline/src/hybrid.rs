//! Rating estimates for every catalog item, optionally blended with genre
//! coverage.
//!
//! `svd_score = clip(mean + user_bias + item_bias[i] + q_i·p)` for every
//! catalog item with inner index `i`. When genres are selected,
//!
//! ```text
//! hybrid = alpha * svd_score / max_rating + (1 - alpha) * coverage
//! coverage = |item_genres ∩ selected| / |selected|
//! ```
//!
//! Both terms sit in `[0, 1]` for ratings scales starting at or above zero, so
//! the blend does too.

use crate::types::{Candidate, RecommendationRequest, UserProfile};
use anyhow::{Result, bail};
use data_loader::{Catalog, Genre, RatingScale};
use factor_store::FactorStore;
use rayon::prelude::*;

/// Fraction of `selected` present in `item_genres`. Zero when either is empty.
pub fn genre_coverage(item_genres: &[Genre], selected: &[Genre]) -> f64 {
    if selected.is_empty() || item_genres.is_empty() {
        return 0.0;
    }
    let hits = selected.iter().filter(|g| item_genres.contains(g)).count();
    hits as f64 / selected.len() as f64
}

#[derive(Debug, Clone, Copy)]
pub struct HybridScorer {
    scale: RatingScale,
}

impl HybridScorer {
    pub fn new(scale: RatingScale) -> Self {
        Self { scale }
    }

    /// `alpha * svd / max_rating + (1 - alpha) * coverage`
    pub fn blend(&self, svd_score: f64, coverage: f64, alpha: f64) -> f64 {
        alpha * (svd_score / self.scale.max) + (1.0 - alpha) * coverage
    }

    /// Score every catalog item the store has factors for, in catalog order.
    ///
    /// Catalog items without an inner id are skipped. `position` is the inner
    /// index, which breaks score ties downstream.
    pub fn score_all(
        &self,
        store: &FactorStore,
        catalog: &dyn Catalog,
        profile: &UserProfile,
        request: &RecommendationRequest,
    ) -> Result<Vec<Candidate>> {
        if profile.n_factors() != store.n_factors() {
            bail!(
                "user vector has {} factors, item factors have {}",
                profile.n_factors(),
                store.n_factors()
            );
        }
        request.validate()?;

        let base = store.global_mean() + profile.bias;

        let candidates = catalog
            .all_item_ids()
            .par_iter()
            .filter_map(|movie_id| {
                let i = store.resolve_inner_id(movie_id)?;
                let raw = base + store.item_bias(i) + store.dot_item(i, &profile.factors);
                let svd_score = self.scale.clip(raw);

                let hybrid_score = request.wants_hybrid().then(|| {
                    let coverage = catalog
                        .lookup(movie_id)
                        .map(|m| genre_coverage(&m.genres, &request.selected_genres))
                        .unwrap_or(0.0);
                    self.blend(svd_score, coverage, request.alpha)
                });

                Some(Candidate {
                    movie_id: movie_id.clone(),
                    position: i,
                    svd_score,
                    hybrid_score,
                })
            })
            .collect();

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{DataIndex, Movie, RawId};
    use factor_store::{Availability, SvdModel, TrainedEntry};
    use std::path::Path;

    fn store(dir: &Path, items: &[(i64, f64)]) -> FactorStore {
        let items = items
            .iter()
            .map(|&(id, bias)| TrainedEntry {
                id: RawId::Int(id),
                bias,
                factors: vec![0.4, -0.3],
            })
            .collect();
        SvdModel::new(3.5, 2, vec![], items)
            .unwrap()
            .export_artifacts(dir)
            .unwrap();
        match FactorStore::load(dir).unwrap() {
            Availability::Ready(store) => store,
            Availability::Unavailable { missing } => panic!("missing {:?}", missing),
        }
    }

    fn catalog(entries: &[(i64, Vec<Genre>)]) -> DataIndex {
        let mut index = DataIndex::new();
        for (id, genres) in entries {
            index.insert_movie(Movie {
                id: RawId::Int(*id),
                title: format!("Movie {}", id),
                year: None,
                genres: genres.clone(),
            });
        }
        index
    }

    #[test]
    fn test_cold_start_scores_are_mean_plus_bias() {
        // A: 0.1, B: -0.2, C: 0.0 around a 3.5 mean
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), &[(1, 0.1), (2, -0.2), (3, 0.0)]);
        let index = catalog(&[(1, vec![]), (2, vec![]), (3, vec![])]);

        let scores = HybridScorer::new(RatingScale::default())
            .score_all(
                &store,
                &index,
                &UserProfile::cold_start(2),
                &RecommendationRequest::new(3),
            )
            .unwrap();

        let svd: Vec<f64> = scores.iter().map(|c| c.svd_score).collect();
        assert!((svd[0] - 3.6).abs() < 1e-12);
        assert!((svd[1] - 3.3).abs() < 1e-12);
        assert!((svd[2] - 3.5).abs() < 1e-12);
        assert!(scores.iter().all(|c| c.hybrid_score.is_none()));
    }

    #[test]
    fn test_scores_are_clipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), &[(1, 4.0), (2, -6.0)]);
        let index = catalog(&[(1, vec![]), (2, vec![])]);

        let scores = HybridScorer::new(RatingScale::default())
            .score_all(
                &store,
                &index,
                &UserProfile::cold_start(2),
                &RecommendationRequest::new(2),
            )
            .unwrap();
        assert_eq!(scores[0].svd_score, 5.0);
        assert_eq!(scores[1].svd_score, 0.5);
    }

    #[test]
    fn test_hybrid_uses_coverage() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), &[(1, 0.0), (2, 0.0), (3, 0.0)]);
        let index = catalog(&[
            (1, vec![Genre::Action, Genre::SciFi, Genre::Thriller]),
            (2, vec![Genre::Action]),
            (3, vec![]),
        ]);
        let request = RecommendationRequest::new(3)
            .with_genres([Genre::Action, Genre::SciFi])
            .with_alpha(0.0);

        let scores = HybridScorer::new(RatingScale::default())
            .score_all(&store, &index, &UserProfile::cold_start(2), &request)
            .unwrap();

        assert_eq!(scores[0].hybrid_score, Some(1.0));
        assert_eq!(scores[1].hybrid_score, Some(0.5));
        assert_eq!(scores[2].hybrid_score, Some(0.0));
    }

    #[test]
    fn test_hybrid_stays_in_unit_interval() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), &[(1, 10.0), (2, -10.0), (3, 0.3)]);
        let index = catalog(&[
            (1, vec![Genre::Drama]),
            (2, vec![]),
            (3, vec![Genre::Drama, Genre::War]),
        ]);
        let profile = UserProfile {
            factors: vec![3.0, -2.0],
            bias: 1.5,
        };
        let scorer = HybridScorer::new(RatingScale::default());

        for alpha in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let request = RecommendationRequest::new(3)
                .with_genres([Genre::Drama, Genre::Comedy])
                .with_alpha(alpha);
            for c in scorer.score_all(&store, &index, &profile, &request).unwrap() {
                let h = c.hybrid_score.unwrap();
                assert!((0.0..=1.0).contains(&h), "alpha {} gave {}", alpha, h);
                assert!((0.5..=5.0).contains(&c.svd_score));
            }
        }
    }

    #[test]
    fn test_factor_count_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), &[(1, 0.0)]);
        let index = catalog(&[(1, vec![])]);

        let result = HybridScorer::new(RatingScale::default()).score_all(
            &store,
            &index,
            &UserProfile::cold_start(3),
            &RecommendationRequest::new(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_scores_only_catalog_items_the_store_knows() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), &[(1, 1.0), (2, 0.9), (3, 0.1), (4, 0.0)]);
        // 7 has no factors; 1 and 2 have no metadata
        let index = catalog(&[(4, vec![]), (7, vec![Genre::Drama]), (3, vec![])]);

        let scores = HybridScorer::new(RatingScale::default())
            .score_all(
                &store,
                &index,
                &UserProfile::cold_start(2),
                &RecommendationRequest::new(2),
            )
            .unwrap();

        let scored: Vec<(RawId, usize)> = scores
            .iter()
            .map(|c| (c.movie_id.clone(), c.position))
            .collect();
        assert_eq!(scored, vec![(RawId::Int(4), 3), (RawId::Int(3), 2)]);
        assert!((scores[1].svd_score - 3.6).abs() < 1e-12);
    }

    #[test]
    fn test_genre_coverage() {
        assert_eq!(genre_coverage(&[Genre::Action], &[]), 0.0);
        assert_eq!(genre_coverage(&[], &[Genre::Action]), 0.0);
        assert_eq!(
            genre_coverage(&[Genre::Action, Genre::Comedy], &[Genre::Action, Genre::Drama]),
            0.5
        );
    }
}
